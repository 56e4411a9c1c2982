use super::EndpointMeta;
use std::sync::Arc;

/// A set of endpoints sharing a mount path.
///
/// Controllers are plain structs owned by the composition root and passed in
/// explicitly; there is no container and no discovery. Each controller builds
/// its own descriptors, capturing `Arc<Self>` clones in the handler adapters,
/// so helper methods that declare no endpoint are skipped by construction.
pub trait Controller: Send + Sync {
    /// Path prefix joined onto every declared endpoint fragment.
    fn mount_path(&self) -> &str {
        ""
    }

    /// Build this controller's endpoint descriptors, in declaration order.
    fn endpoints(self: Arc<Self>) -> Vec<EndpointMeta>;
}

/// Flatten the controllers into the endpoint list.
///
/// Order is stable: controller order first, then each controller's own
/// declaration order. Duplicate path+verb pairs are allowed here; the router
/// resolves collisions by first match.
pub fn collect_endpoints(controllers: &[Arc<dyn Controller>]) -> Vec<EndpointMeta> {
    let mut endpoints = Vec::new();
    for controller in controllers {
        let mount = controller.mount_path().to_string();
        for mut endpoint in Arc::clone(controller).endpoints() {
            endpoint.path = join_paths(&mount, &endpoint.path);
            endpoints.push(endpoint);
        }
    }
    endpoints
}

/// Join a mount path and an endpoint fragment.
///
/// Both empty → empty; one empty → the other, unchanged; both present →
/// exactly one separator at the join point, whatever each side carried.
#[must_use]
pub fn join_paths(base: &str, fragment: &str) -> String {
    if base.is_empty() {
        return fragment.to_string();
    }
    if fragment.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        fragment.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_identity_on_each_side() {
        assert_eq!(join_paths("", ""), "");
        assert_eq!(join_paths("/v1/crew", ""), "/v1/crew");
        assert_eq!(join_paths("", "/:name"), "/:name");
        assert_eq!(join_paths("", "relative"), "relative");
    }

    #[test]
    fn join_uses_exactly_one_separator() {
        assert_eq!(join_paths("/v1/crew", "/:name"), "/v1/crew/:name");
        assert_eq!(join_paths("/v1/crew/", ":name"), "/v1/crew/:name");
        assert_eq!(join_paths("/v1/crew/", "/:name"), "/v1/crew/:name");
        assert_eq!(join_paths("/v1/crew", ":name"), "/v1/crew/:name");
        assert_eq!(join_paths("/v1/crew//", "///:name"), "/v1/crew/:name");
        assert_eq!(join_paths("/", "/"), "/");
    }

    #[test]
    fn join_is_associative() {
        let cases = [
            ("/api", "/v1/", "/crew"),
            ("api/", "v1", ":name"),
            ("", "/v1", "crew/"),
            ("/api//", "", "//crew"),
            ("/", "/", "/"),
        ];
        for (a, b, c) in cases {
            assert_eq!(
                join_paths(&join_paths(a, b), c),
                join_paths(a, &join_paths(b, c)),
                "not associative for ({a:?}, {b:?}, {c:?})"
            );
        }
    }
}
