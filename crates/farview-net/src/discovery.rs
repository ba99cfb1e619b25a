//! Boundary to the external discovery service.
//!
//! Global discovery lookup is not part of this crate; the surrounding
//! application supplies a [`Resolver`] and the literal target `dynamic`
//! delegates to it.

use farview_shared::DeviceId;

use crate::error::{NetError, Result};
use crate::transport::TargetAddr;

/// Maps a device id to candidate addresses (`tcp://` / `relay://` URLs).
pub trait Resolver: Send + Sync {
    fn resolve(&self, device: &DeviceId) -> Vec<String>;
}

/// Turn a user-supplied target into a dialable address.
///
/// `dynamic` asks the resolver and picks the first parseable address;
/// anything else must parse as a target URL itself.
pub fn resolve_target(
    url: &str,
    peer: &DeviceId,
    resolver: Option<&dyn Resolver>,
) -> Result<TargetAddr> {
    if url != "dynamic" {
        return TargetAddr::parse(url);
    }
    let resolver = resolver.ok_or(NetError::ResolverUnavailable)?;
    for address in resolver.resolve(peer) {
        match TargetAddr::parse(&address) {
            Ok(target) => return Ok(target),
            Err(e) => {
                tracing::warn!(address = %address, error = %e, "skipping unusable discovered address");
            }
        }
    }
    Err(NetError::NoAddresses)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedResolver(Vec<String>);

    impl Resolver for FixedResolver {
        fn resolve(&self, _device: &DeviceId) -> Vec<String> {
            self.0.clone()
        }
    }

    #[test]
    fn explicit_url_bypasses_resolver() {
        let peer = DeviceId::from_raw([1u8; 32]);
        let target = resolve_target("tcp://10.0.0.1:22000", &peer, None).unwrap();
        assert!(matches!(target, TargetAddr::Tcp { .. }));
    }

    #[test]
    fn dynamic_requires_resolver() {
        let peer = DeviceId::from_raw([1u8; 32]);
        assert!(matches!(
            resolve_target("dynamic", &peer, None),
            Err(NetError::ResolverUnavailable)
        ));
    }

    #[test]
    fn dynamic_skips_unusable_addresses() {
        let peer = DeviceId::from_raw([1u8; 32]);
        let resolver = FixedResolver(vec![
            "garbage".into(),
            "tcp://192.0.2.7:22000".into(),
        ]);
        let target = resolve_target("dynamic", &peer, Some(&resolver)).unwrap();
        assert_eq!(
            target,
            TargetAddr::Tcp {
                host: "192.0.2.7".into(),
                port: 22000
            }
        );
    }

    #[test]
    fn dynamic_with_no_usable_addresses_fails() {
        let peer = DeviceId::from_raw([1u8; 32]);
        let resolver = FixedResolver(vec!["nope".into()]);
        assert!(matches!(
            resolve_target("dynamic", &peer, Some(&resolver)),
            Err(NetError::NoAddresses)
        ));
    }
}
