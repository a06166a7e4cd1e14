//! Static route table.
//!
//! Every inbound path mirrors the upstream route it proxies: `/games/{id}`
//! becomes `games/42` on the upstream side.

/// Shape of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Collection listing; accepts a free-form query suffix.
    List,
    /// Single item by integer id.
    Detail,
    /// Sub-resource of a single item (`games/{id}/screenshots`).
    SubResource,
}

/// One proxied route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDescriptor {
    /// Route identifier for logging/metrics.
    pub name: &'static str,
    /// Upstream path template, `{id}` marks the integer parameter.
    pub template: &'static str,
    pub kind: RouteKind,
}

impl RouteDescriptor {
    const fn new(name: &'static str, template: &'static str, kind: RouteKind) -> Self {
        Self { name, template, kind }
    }

    /// List routes take a query suffix; every other kind takes an id instead.
    pub fn accepts_query(&self) -> bool {
        matches!(self.kind, RouteKind::List)
    }

    /// Inbound axum path, e.g. `/games/{id}/screenshots`.
    pub fn path(&self) -> String {
        format!("/{}", self.template)
    }

    /// Upstream route with the id filled in.
    pub fn upstream_path(&self, id: Option<i32>) -> String {
        match id {
            Some(id) => self.template.replace("{id}", &id.to_string()),
            None => self.template.to_string(),
        }
    }
}

/// Every route the proxy serves.
pub static ROUTES: &[RouteDescriptor] = &[
    RouteDescriptor::new("games", "games", RouteKind::List),
    RouteDescriptor::new("game", "games/{id}", RouteKind::Detail),
    RouteDescriptor::new("game_screenshots", "games/{id}/screenshots", RouteKind::SubResource),
    RouteDescriptor::new("genres", "genres", RouteKind::List),
    RouteDescriptor::new("genre", "genres/{id}", RouteKind::Detail),
    RouteDescriptor::new("publishers", "publishers", RouteKind::List),
    RouteDescriptor::new("publisher", "publishers/{id}", RouteKind::Detail),
    RouteDescriptor::new("platforms", "platforms", RouteKind::List),
    RouteDescriptor::new("platform", "platforms/{id}", RouteKind::Detail),
    RouteDescriptor::new("tags", "tags", RouteKind::List),
    RouteDescriptor::new("tag", "tags/{id}", RouteKind::Detail),
];
