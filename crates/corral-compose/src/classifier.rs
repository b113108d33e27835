//! Service classification from image and `external_ips`.

use corral_common::constants::{DNS_SERVICE_IMAGE, EXTERNAL_SERVICE_IMAGE, LOAD_BALANCER_IMAGE};

use crate::model::ServiceKind;
use crate::parser::ServiceSpec;

/// Assigns a kind to a service entry; first match wins.
///
/// 1. `external_ips` non-empty, or the external-service image: external.
/// 2. The load-balancer image: load balancer.
/// 3. The DNS image: DNS.
/// 4. Anything else: standard.
#[must_use]
pub fn classify(spec: &ServiceSpec) -> ServiceKind {
    let repository = spec.image().map(image_repository);
    let is = |well_known: &str| repository.is_some_and(|repo| matches_image(repo, well_known));

    if !spec.external_ips.is_empty() || is(EXTERNAL_SERVICE_IMAGE) {
        ServiceKind::External
    } else if is(LOAD_BALANCER_IMAGE) {
        ServiceKind::LoadBalancer
    } else if is(DNS_SERVICE_IMAGE) {
        ServiceKind::Dns
    } else {
        ServiceKind::Standard
    }
}

/// Strips the digest and tag from an image reference.
///
/// A registry port (`host:5000/repo`) is not mistaken for a tag.
#[must_use]
pub fn image_repository(image: &str) -> &str {
    let image = image.split_once('@').map_or(image, |(repo, _)| repo);
    match image.rfind(':') {
        Some(colon) if !image[colon..].contains('/') => &image[..colon],
        _ => image,
    }
}

fn matches_image(repository: &str, well_known: &str) -> bool {
    repository == well_known
        || repository
            .strip_suffix(well_known)
            .is_some_and(|registry| registry.ends_with('/'))
}
