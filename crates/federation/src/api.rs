//! JSON-RPC interface served by guardians.

use fedpeg_primitives::ProofHash;
use jsonrpsee::{core::RpcResult, proc_macros::rpc};

use crate::types::{PegInRequest, PegInResponse, PegInStatusResponse};

#[rpc(server, client, namespace = "fedpeg")]
pub trait FedPegApi {
    /// Registers a proven deposit. Submitting the same proof twice returns the original outcome.
    #[method(name = "submitPegIn")]
    async fn submit_peg_in(&self, request: PegInRequest) -> RpcResult<PegInResponse>;

    /// Reports what the guardian knows about a proof.
    #[method(name = "pegInStatus")]
    async fn peg_in_status(&self, proof_hash: ProofHash) -> RpcResult<PegInStatusResponse>;
}
