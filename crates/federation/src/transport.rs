use std::{collections::HashMap, fmt, time::Duration};

use async_trait::async_trait;
use fedpeg_config::FederationConfig;
use fedpeg_primitives::{GuardianId, ProofHash};
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};

use crate::{
    TransportError,
    api::FedPegApiClient,
    types::{PegInRequest, PegInResponse, PegInStatusResponse},
};

/// Delivers requests to individual guardians.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait FederationTransport: Send + Sync {
    async fn submit_peg_in(
        &self,
        guardian: GuardianId,
        request: PegInRequest,
    ) -> Result<PegInResponse, TransportError>;

    async fn peg_in_status(
        &self,
        guardian: GuardianId,
        proof_hash: ProofHash,
    ) -> Result<PegInStatusResponse, TransportError>;
}

/// [`FederationTransport`] over JSON-RPC on HTTP, one client per guardian endpoint.
pub struct RpcTransport {
    clients: HashMap<GuardianId, HttpClient>,
}

impl fmt::Debug for RpcTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcTransport")
            .field("guardians", &self.clients.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RpcTransport {
    /// Builds clients for every guardian in `federation`.
    ///
    /// No connection is made until the first request.
    pub fn new(
        federation: &FederationConfig,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let clients = federation
            .guardians
            .iter()
            .map(|guardian| {
                HttpClientBuilder::default()
                    .request_timeout(request_timeout)
                    .build(&guardian.endpoint)
                    .map(|client| (guardian.id, client))
                    .map_err(|source| TransportError::Rpc {
                        guardian: guardian.id,
                        source,
                    })
            })
            .collect::<Result<_, _>>()?;

        Ok(Self { clients })
    }

    fn client(&self, guardian: GuardianId) -> Result<&HttpClient, TransportError> {
        self.clients
            .get(&guardian)
            .ok_or(TransportError::UnknownGuardian(guardian))
    }
}

#[async_trait]
impl FederationTransport for RpcTransport {
    async fn submit_peg_in(
        &self,
        guardian: GuardianId,
        request: PegInRequest,
    ) -> Result<PegInResponse, TransportError> {
        self.client(guardian)?
            .submit_peg_in(request)
            .await
            .map_err(|source| TransportError::Rpc { guardian, source })
    }

    async fn peg_in_status(
        &self,
        guardian: GuardianId,
        proof_hash: ProofHash,
    ) -> Result<PegInStatusResponse, TransportError> {
        self.client(guardian)?
            .peg_in_status(proof_hash)
            .await
            .map_err(|source| TransportError::Rpc { guardian, source })
    }
}
