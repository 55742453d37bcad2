//! Property tests for selector routing

mod common;

use common::default_router;
use proptest::prelude::*;

use message_workshop::messaging::routing::KNOWN_ROUTES;
use message_workshop::messaging::{DestinationKind, PayloadSpec, QUEUE_ALERT_TEXT};

fn is_known(selector: &str) -> bool {
    KNOWN_ROUTES.iter().any(|route| route.selector == selector)
}

proptest! {
    /// Property: any selector outside the table takes the fallback route
    #[test]
    fn unknown_selectors_route_to_fallback(selector in ".{0,64}") {
        prop_assume!(!is_known(&selector));

        let router = default_router();
        let route = router.route(&selector);
        prop_assert!(route.is_fallback());
        prop_assert_eq!(route.kind, DestinationKind::Queue);
        prop_assert_eq!(route.destination_name.as_str(), "test.alchemy");
        prop_assert_eq!(&route.payload, &PayloadSpec::literal(QUEUE_ALERT_TEXT));
    }

    /// Property: selectors that merely resemble known ones are not matched
    #[test]
    fn near_miss_selectors_route_to_fallback(
        index in 0..KNOWN_ROUTES.len(),
        suffix in "[a-z.]{1,8}",
    ) {
        let selector = format!("{}{}", KNOWN_ROUTES[index].selector, suffix);
        prop_assume!(!is_known(&selector));

        prop_assert!(default_router().route(&selector).is_fallback());
    }

    /// Property: routing never depends on the configured defaults for named routes
    #[test]
    fn named_routes_ignore_configured_defaults(
        queue in "[a-z]{1,12}\\.[a-z]{1,12}",
        topic in "[a-z]{1,12}\\.[a-z]{1,12}",
    ) {
        let router = message_workshop::messaging::DestinationRouter::new(queue.clone(), topic.clone());
        prop_assert_eq!(router.route("magic.order").destination_name.as_str(), "magic.order");
        prop_assert_eq!(router.route("magic.alerts").destination_name.as_str(), topic.as_str());
        prop_assert_eq!(router.route("").destination_name.as_str(), queue.as_str());
    }
}

#[test]
fn test_empty_selector_routes_to_fallback() {
    let router = default_router();
    assert!(router.route("").is_fallback());
    assert_eq!(router.route(""), router.route_optional(None));
}

#[test]
fn test_every_known_selector_routes_to_itself() {
    let router = default_router();
    for spec in KNOWN_ROUTES {
        let route = router.route(spec.selector);
        assert_eq!(route.selector, spec.selector);
        assert_eq!(route.kind, spec.kind);
        assert!(!route.destination_name.is_empty());
    }
}
