use crate::point::Point;

/// Tag values to force onto every point of a batch. `None` leaves the
/// point's own value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagOverrides {
    pub hostname: Option<String>,
    pub server: Option<String>,
    pub ip: Option<String>,
}

impl TagOverrides {
    /// An empty hostname counts as no override.
    pub fn with_hostname(hostname: Option<String>) -> Self {
        TagOverrides {
            hostname: hostname.filter(|hostname| !hostname.is_empty()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries().all(|(_, value)| value.is_none())
    }

    fn entries(&self) -> impl Iterator<Item = (&'static str, Option<&str>)> {
        [
            ("hostname", self.hostname.as_deref()),
            ("server", self.server.as_deref()),
            ("ip", self.ip.as_deref()),
        ]
        .into_iter()
    }
}

/// Replaces the tags named in `overrides` on every point that already has
/// them. Tags missing from a point are never added.
#[tracing::instrument(skip_all, level = tracing::Level::TRACE)]
pub fn apply_overrides(points: &mut [Point], overrides: &TagOverrides) {
    for point in points.iter_mut() {
        for (key, value) in overrides.entries() {
            if let Some(value) = value {
                point.replace_tag(key, value);
            }
        }
    }
}
