// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Auth credential issuance and verification.
//!
//! The credential is an HS256 JWT scoping a single node identity: `sub` is
//! the node id, `tid` the tenant id. It is minted once per successful
//! enrollment with a long expiry and no refresh mechanism; re-enrollment
//! obtains a new credential. Verification failures collapse to a single
//! generic `Unauthorized` so the endpoint cannot be used as a validation
//! oracle.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use talon_common_core::{FleetError, FleetResult, NodeId, TenantId};

/// Default credential lifetime: 30 days.
const DEFAULT_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// JWT claims for a node credential.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
	/// Node id.
	sub: String,
	/// Tenant id.
	tid: String,
	/// Credential id, stored on the node record for revocation bookkeeping.
	jti: String,
	/// Issued at (seconds since epoch).
	iat: u64,
	/// Expiration (seconds since epoch).
	exp: u64,
}

/// The identity a verified credential resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
	pub node_id: NodeId,
	pub tenant_id: TenantId,
}

/// A freshly minted credential.
#[derive(Debug, Clone)]
pub struct IssuedCredential {
	pub token: String,
	pub credential_id: String,
	pub expires_at_secs: u64,
}

/// Mints and verifies node credentials with a single server-side secret.
pub struct CredentialIssuer {
	encoding: EncodingKey,
	decoding: DecodingKey,
	ttl_secs: u64,
}

impl CredentialIssuer {
	pub fn new(secret: &[u8]) -> Self {
		Self {
			encoding: EncodingKey::from_secret(secret),
			decoding: DecodingKey::from_secret(secret),
			ttl_secs: DEFAULT_TTL_SECS,
		}
	}

	pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
		self.ttl_secs = ttl_secs;
		self
	}

	/// Issues a credential scoped to one node.
	pub fn issue(&self, node_id: &NodeId, tenant_id: &TenantId) -> FleetResult<IssuedCredential> {
		let now = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map_err(|e| FleetError::Internal(format!("system time error: {e}")))?
			.as_secs();

		let credential_id = Uuid::new_v4().to_string();
		let claims = Claims {
			sub: node_id.0.clone(),
			tid: tenant_id.0.clone(),
			jti: credential_id.clone(),
			iat: now,
			exp: now + self.ttl_secs,
		};

		let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
			.map_err(|e| FleetError::Internal(format!("failed to encode credential: {e}")))?;

		debug!(node_id = %node_id, exp = claims.exp, "node credential issued");

		Ok(IssuedCredential {
			token,
			credential_id,
			expires_at_secs: claims.exp,
		})
	}

	/// Verifies signature and expiry, resolving the node identity.
	///
	/// All failure modes return the same generic reason.
	pub fn verify(&self, token: &str) -> FleetResult<NodeIdentity> {
		let mut validation = Validation::new(Algorithm::HS256);
		validation.validate_exp = true;

		let data = decode::<Claims>(token, &self.decoding, &validation)
			.map_err(|_| FleetError::Unauthorized("invalid credential".to_string()))?;

		Ok(NodeIdentity {
			node_id: NodeId(data.claims.sub),
			tenant_id: TenantId(data.claims.tid),
		})
	}
}
