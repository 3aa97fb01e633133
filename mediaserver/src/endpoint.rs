use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use log::debug;
use sdp::{Capabilities, DtlsInfo, IceInfo, SessionInfo, Setup};
use shared::error::{Error, Result};

use crate::engine::Bundle;
use crate::lock;
use crate::ssrc::SsrcAllocator;
use crate::transport::{Transport, TransportParameters};

/// Hash announced along with the endpoint certificate fingerprint.
pub const DTLS_FINGERPRINT_HASH: &str = "sha-256";

struct EndpointInternal {
    transports: BTreeMap<String, Arc<Transport>>,
    stopped: bool,
}

/// Entry point of the media server: owns the bundle shared by every
/// transport and creates transports from remote session descriptions.
pub struct Endpoint {
    bundle: Arc<dyn Bundle>,
    ssrcs: Arc<SsrcAllocator>,
    internal: Arc<Mutex<EndpointInternal>>,
}

impl Endpoint {
    pub fn new(bundle: Arc<dyn Bundle>) -> Self {
        Endpoint {
            bundle,
            ssrcs: Arc::new(SsrcAllocator::new()),
            internal: Arc::new(Mutex::new(EndpointInternal {
                transports: BTreeMap::new(),
                stopped: false,
            })),
        }
    }

    /// SSRC allocator shared by every transport of this endpoint.
    pub fn ssrc_allocator(&self) -> Arc<SsrcAllocator> {
        Arc::clone(&self.ssrcs)
    }

    pub fn dtls_fingerprint(&self) -> String {
        self.bundle.dtls_fingerprint()
    }

    /// Local DTLS parameters with the given role.
    pub fn local_dtls(&self, setup: Setup) -> DtlsInfo {
        DtlsInfo::new(setup, DTLS_FINGERPRINT_HASH, &self.bundle.dtls_fingerprint())
    }

    /// Creates the transport for `remote`.
    ///
    /// Local ICE credentials and DTLS parameters are taken from `local` when
    /// given, otherwise generated. The local DTLS role is always the opposite
    /// of the remote one, an `actpass` role being resolved that way.
    pub fn create_transport(&self, remote: &SessionInfo, local: Option<&SessionInfo>) -> Result<Arc<Transport>> {
        if lock(&self.internal).stopped {
            return Err(Error::ErrClosed);
        }

        let remote_ice = remote.ice.clone().ok_or(Error::ErrSdpMissingIce)?;
        let remote_dtls = remote.dtls.clone().ok_or(Error::ErrSdpMissingDtls)?;

        let local_ice = local
            .and_then(|l| l.ice.clone())
            .unwrap_or_else(|| IceInfo::generate(true));
        let local_dtls = match local.and_then(|l| l.dtls.clone()) {
            Some(dtls) if dtls.setup != Setup::Actpass => dtls,
            Some(dtls) => DtlsInfo {
                setup: remote_dtls.setup.reverse(),
                ..dtls
            },
            None => self.local_dtls(remote_dtls.setup.reverse()),
        };
        let local_candidates = match local {
            Some(l) if !l.candidates.is_empty() => l.candidates.clone(),
            _ => self.bundle.local_candidates(),
        };

        let engine = self
            .bundle
            .create_transport(&remote_ice, &remote_dtls, &local_ice, &local_dtls)?;

        let transport = Transport::new(
            engine,
            TransportParameters {
                local_ice,
                local_dtls,
                local_candidates,
                remote_ice,
                remote_dtls,
                remote_candidates: remote.candidates.clone(),
            },
            Arc::clone(&self.ssrcs),
        );

        let username = transport.username().to_owned();
        lock(&self.internal)
            .transports
            .insert(username.clone(), Arc::clone(&transport));

        let internal = Arc::downgrade(&self.internal);
        transport.on_stopped(move || {
            if let Some(internal) = internal.upgrade() {
                lock(&internal).transports.remove(&username);
            }
        });
        debug!("endpoint: transport {} created", transport.username());

        Ok(transport)
    }

    /// Creates an offer for `capabilities` with fresh ICE credentials.
    pub fn create_offer(&self, capabilities: &Capabilities) -> SessionInfo {
        SessionInfo::create(
            IceInfo::generate(true),
            self.local_dtls(Setup::Actpass),
            self.bundle.local_candidates(),
            capabilities,
        )
    }

    pub fn transports(&self) -> Vec<Arc<Transport>> {
        lock(&self.internal).transports.values().cloned().collect()
    }

    /// Stops every transport. Idempotent.
    pub fn stop(&self) {
        let transports = {
            let mut internal = lock(&self.internal);
            if internal.stopped {
                return;
            }
            internal.stopped = true;
            internal.transports.values().cloned().collect::<Vec<_>>()
        };

        for transport in transports {
            transport.stop();
        }
        debug!("endpoint stopped");
    }
}
