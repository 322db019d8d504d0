//! GDPR erasure: request lifecycle, category purging, key-destruction
//! records, certificates and the overdue sweep.
//!
//! Immutable chain history is never deleted; it is made cryptographically
//! unreadable by destroying envelope keys, which forces such requests into
//! PartiallyCompleted.

use crate::store;
use crate::VeidModule;
use parity_scale_codec::{Decode, Encode};
use veid_api::events::EventSink;
use veid_api::state::StateAccess;
use veid_api::transaction::TxContext;
use veid_types::app::{
    domain_hash, sha256, AccountId, ConsentSettings, ErasureCategory, ErasureCertificate,
    ErasureReport, ErasureRequest, ErasureStatus, IdentityEvent, IdentityScope,
    KeyDestructionRecord,
};
use veid_types::error::IdentityError;
use veid_types::keys;

/// Parameters for `SubmitErasureRequest`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct SubmitErasureRequestParams {
    /// The categories to erase. `All` expands at processing time.
    pub categories: Vec<ErasureCategory>,
}

/// Response to `SubmitErasureRequest`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct SubmitErasureRequestResponse {
    /// The new request id.
    pub request_id: String,
    /// The statutory processing deadline.
    pub deadline_at: u64,
    /// Height at which the effect is recorded.
    pub height: u64,
}

/// Parameters for `ProcessErasureRequest`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct ProcessErasureRequestParams {
    /// The request to process.
    pub request_id: String,
}

/// Response to `ProcessErasureRequest`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct ProcessErasureRequestResponse {
    /// The request status after processing.
    pub status: ErasureStatus,
    /// Height at which the effect is recorded.
    pub height: u64,
}

/// Parameters for `GenerateErasureCertificate`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct GenerateErasureCertificateParams {
    /// The processed request to certify.
    pub request_id: String,
}

/// Response to `GenerateErasureCertificate`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct GenerateErasureCertificateResponse {
    /// The certificate.
    pub certificate: ErasureCertificate,
    /// Height at which the certificate was issued.
    pub height: u64,
}

impl VeidModule {
    fn erasure_request_key(request_id: &str) -> Vec<u8> {
        keys::key1(keys::ERASURE_REQUEST_PREFIX, request_id.as_bytes())
    }

    fn pending_erasure_key(request: &ErasureRequest) -> Vec<u8> {
        keys::time_ordered_key(
            keys::PENDING_ERASURE_PREFIX,
            request.deadline_at,
            request.request_id.as_bytes(),
        )
    }

    pub(crate) fn load_erasure_request(
        &self,
        state: &dyn StateAccess,
        request_id: &str,
    ) -> Result<ErasureRequest, IdentityError> {
        let request = store::get_typed(state, &Self::erasure_request_key(request_id))?;
        store::require(request, "erasure request", request_id)
    }

    fn save_erasure_request(
        &self,
        state: &mut dyn StateAccess,
        request: &ErasureRequest,
    ) -> Result<(), IdentityError> {
        store::put_typed(state, &Self::erasure_request_key(&request.request_id), request)
    }

    /// Whether the account is under a legal hold.
    pub fn has_legal_hold(
        &self,
        state: &dyn StateAccess,
        account: &AccountId,
    ) -> Result<bool, IdentityError> {
        Ok(state
            .get(&keys::key1(keys::LEGAL_HOLD_PREFIX, account.as_ref()))?
            .is_some())
    }

    /// Places or lifts a legal hold (authority only).
    pub fn set_legal_hold(
        &self,
        state: &mut dyn StateAccess,
        account: &AccountId,
        held: bool,
    ) -> Result<(), IdentityError> {
        let key = keys::key1(keys::LEGAL_HOLD_PREFIX, account.as_ref());
        if held {
            store::put_index(state, &key)
        } else {
            state.delete(&key)?;
            Ok(())
        }
    }

    /// Handles `SubmitErasureRequest`.
    pub fn submit_erasure_request(
        &self,
        state: &mut dyn StateAccess,
        params: SubmitErasureRequestParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<SubmitErasureRequestResponse, IdentityError> {
        let requester = ctx.signer_account_id;
        if params.categories.is_empty() {
            return Err(IdentityError::InvalidParameter(
                "at least one category is required".into(),
            ));
        }
        let mut categories = params.categories;
        categories.sort();
        categories.dedup();
        if categories.contains(&ErasureCategory::All) {
            categories = vec![ErasureCategory::All];
        }

        // One open request per account at a time.
        let by_address_prefix =
            keys::key2(keys::ERASURE_BY_ADDRESS_PREFIX, requester.as_ref(), b"");
        for (index_key, _) in store::collect_prefix(state, &by_address_prefix)? {
            let existing_id =
                match String::from_utf8(index_key[by_address_prefix.len()..].to_vec()) {
                    Ok(id) => id,
                    Err(_) => continue,
                };
            let existing = self.load_erasure_request(state, &existing_id)?;
            if matches!(
                existing.status,
                ErasureStatus::Pending | ErasureStatus::Processing
            ) {
                return Err(IdentityError::AlreadyExists {
                    entity: "erasure request",
                    id: existing_id,
                });
            }
        }

        let module_params = store::load_params(state)?;
        let request_id = hex::encode(domain_hash(
            b"VEID-ERASURE-ID::V1",
            &[
                requester.as_ref(),
                &ctx.block_height.to_be_bytes(),
                &ctx.block_time.to_be_bytes(),
            ],
        ));
        let verification_hash = domain_hash(
            b"VEID-ERASURE-VERIFY::V1",
            &[
                requester.as_ref(),
                request_id.as_bytes(),
                &ctx.block_time.to_be_bytes(),
            ],
        );
        let request = ErasureRequest {
            request_id: request_id.clone(),
            requester,
            categories,
            status: ErasureStatus::Pending,
            submitted_at: ctx.block_time,
            submitted_at_height: ctx.block_height,
            deadline_at: ctx.block_time + module_params.erasure.deadline_secs,
            processed_at: None,
            rejection_reason: None,
            erasure_report: None,
            verification_hash,
        };
        self.save_erasure_request(state, &request)?;
        store::put_index(
            state,
            &keys::key2(
                keys::ERASURE_BY_ADDRESS_PREFIX,
                requester.as_ref(),
                request_id.as_bytes(),
            ),
        )?;
        store::put_index(state, &Self::pending_erasure_key(&request))?;

        sink.emit(IdentityEvent::ErasureRequested {
            request_id: request_id.clone(),
            requester,
        });
        Ok(SubmitErasureRequestResponse {
            request_id,
            deadline_at: request.deadline_at,
            height: ctx.block_height,
        })
    }

    /// Handles `ProcessErasureRequest` by the requester or the authority.
    pub fn process_erasure_request(
        &self,
        state: &mut dyn StateAccess,
        params: ProcessErasureRequestParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<ProcessErasureRequestResponse, IdentityError> {
        let caller = ctx.signer_account_id;
        let module_params = store::load_params(state)?;
        let request = self.load_erasure_request(state, &params.request_id)?;
        if caller != request.requester && caller != module_params.authority {
            return Err(IdentityError::Unauthorized(
                "only the requester or the authority may trigger processing".into(),
            ));
        }
        let status = self.execute_erasure(state, &params.request_id, ctx, sink)?;
        Ok(ProcessErasureRequestResponse {
            status,
            height: ctx.block_height,
        })
    }

    /// The shared processing routine behind the handler and the overdue
    /// sweep: Pending → Processing → terminal.
    fn execute_erasure(
        &self,
        state: &mut dyn StateAccess,
        request_id: &str,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<ErasureStatus, IdentityError> {
        let mut request = self.load_erasure_request(state, request_id)?;
        if request.status != ErasureStatus::Pending {
            return Err(IdentityError::Precondition(format!(
                "erasure request {} is not pending",
                request_id
            )));
        }
        let queue_key = Self::pending_erasure_key(&request);

        if self.has_legal_hold(state, &request.requester)? {
            request.status = ErasureStatus::Rejected;
            request.rejection_reason = Some("legal_hold".to_string());
            request.processed_at = Some(ctx.block_time);
            self.save_erasure_request(state, &request)?;
            state.delete(&queue_key)?;
            sink.emit(IdentityEvent::ErasureRejected {
                request_id: request_id.to_string(),
                reason: "legal_hold".to_string(),
            });
            return Ok(ErasureStatus::Rejected);
        }

        request.status = ErasureStatus::Processing;
        self.save_erasure_request(state, &request)?;
        sink.emit(IdentityEvent::ErasureProcessing {
            request_id: request_id.to_string(),
        });

        let categories: Vec<ErasureCategory> =
            if request.categories.contains(&ErasureCategory::All) {
                ErasureCategory::concrete().to_vec()
            } else {
                request.categories.clone()
            };

        let mut fingerprints: Vec<[u8; 32]> = Vec::new();
        let mut destroyed = 0u32;
        for category in &categories {
            destroyed +=
                self.purge_category(state, &request.requester, *category, &mut fingerprints)?;
        }

        let record_id = hex::encode(domain_hash(
            b"VEID-KEY-DESTRUCTION-ID::V1",
            &[request_id.as_bytes(), &ctx.block_height.to_be_bytes()],
        ));
        let destruction = KeyDestructionRecord {
            record_id: record_id.clone(),
            account: request.requester,
            request_id: request_id.to_string(),
            categories: categories.clone(),
            key_fingerprints: fingerprints,
            destroyed_at: ctx.block_time,
            destroyed_at_height: ctx.block_height,
        };
        store::put_typed(
            state,
            &keys::key1(keys::KEY_DESTRUCTION_PREFIX, record_id.as_bytes()),
            &destruction,
        )?;
        store::put_index(
            state,
            &keys::key2(
                keys::KEY_DESTRUCTION_BY_ACCOUNT_PREFIX,
                request.requester.as_ref(),
                record_id.as_bytes(),
            ),
        )?;
        sink.emit(IdentityEvent::KeyDestruction {
            record_id,
            account: request.requester,
            key_count: destruction.key_fingerprints.len() as u32,
        });

        // Scope envelopes survive on chain, made unreadable rather than
        // deleted; that forces the partial outcome.
        let made_unreadable = categories.contains(&ErasureCategory::ScopePayloads);
        let status = if made_unreadable {
            ErasureStatus::PartiallyCompleted
        } else {
            ErasureStatus::Completed
        };
        request.status = status;
        request.processed_at = Some(ctx.block_time);
        request.erasure_report = Some(ErasureReport {
            categories_erased: categories.clone(),
            records_destroyed: destroyed,
            on_chain_data_made_unreadable: made_unreadable,
        });
        self.save_erasure_request(state, &request)?;
        state.delete(&queue_key)?;

        sink.emit(IdentityEvent::ErasureCompleted {
            request_id: request_id.to_string(),
            categories,
            partial: made_unreadable,
        });
        Ok(status)
    }

    /// Purges one category for an account, appending the fingerprints of the
    /// destroyed key material. Returns the number of records destroyed.
    fn purge_category(
        &self,
        state: &mut dyn StateAccess,
        account: &AccountId,
        category: ErasureCategory,
        fingerprints: &mut Vec<[u8; 32]>,
    ) -> Result<u32, IdentityError> {
        match category {
            ErasureCategory::BiometricTemplates => {
                let index_prefix =
                    keys::key2(keys::BIOMETRIC_BY_ACCOUNT_PREFIX, account.as_ref(), b"");
                let mut destroyed = 0u32;
                for (index_key, _) in store::collect_prefix(state, &index_prefix)? {
                    let hash_id =
                        match String::from_utf8(index_key[index_prefix.len()..].to_vec()) {
                            Ok(id) => id,
                            Err(_) => continue,
                        };
                    let primary_key =
                        keys::key1(keys::BIOMETRIC_HASH_PREFIX, hash_id.as_bytes());
                    if let Some(record) = store::get_typed::<
                        veid_types::app::BiometricTemplateHash,
                    >(state, &primary_key)?
                    {
                        fingerprints.push(sha256(&record.hash_value));
                        destroyed += 1;
                    }
                    // Indexes derived from the prior record are removed
                    // before the primary.
                    state.delete(&index_key)?;
                    state.delete(&primary_key)?;
                }
                Ok(destroyed)
            }
            ErasureCategory::DerivedFeatures => {
                match store::get_typed::<veid_types::app::Wallet>(
                    state,
                    &Self::wallet_key(account),
                )? {
                    Some(mut wallet) if !wallet.derived_features.is_empty() => {
                        let count = wallet.derived_features.len() as u32;
                        for feature in &wallet.derived_features {
                            fingerprints.push(sha256(feature));
                        }
                        wallet.derived_features.clear();
                        self.save_wallet(state, &wallet)?;
                        Ok(count)
                    }
                    _ => Ok(0),
                }
            }
            ErasureCategory::ConsentRecords => {
                match store::get_typed::<veid_types::app::Wallet>(
                    state,
                    &Self::wallet_key(account),
                )? {
                    Some(mut wallet) => {
                        wallet.consent_settings = ConsentSettings::default();
                        self.save_wallet(state, &wallet)?;
                        Ok(1)
                    }
                    None => Ok(0),
                }
            }
            ErasureCategory::ScopePayloads => {
                let index_prefix =
                    keys::key2(keys::SCOPE_BY_ACCOUNT_PREFIX, account.as_ref(), b"");
                let mut destroyed = 0u32;
                for (index_key, _) in store::collect_prefix(state, &index_prefix)? {
                    let scope_id =
                        match String::from_utf8(index_key[index_prefix.len()..].to_vec()) {
                            Ok(id) => id,
                            Err(_) => continue,
                        };
                    let key = Self::scope_key(&scope_id);
                    if let Some(mut scope) =
                        store::get_typed::<IdentityScope>(state, &key)?
                    {
                        if scope.encrypted_payload.is_empty() {
                            continue;
                        }
                        fingerprints.push(sha256(&scope.encrypted_payload));
                        scope.encrypted_payload = Vec::new();
                        store::put_typed(state, &key, &scope)?;
                        destroyed += 1;
                    }
                }
                Ok(destroyed)
            }
            // Normalized away before this point.
            ErasureCategory::All => Ok(0),
        }
    }

    /// Handles `GenerateErasureCertificate` for a processed request.
    pub fn generate_erasure_certificate(
        &self,
        state: &mut dyn StateAccess,
        params: GenerateErasureCertificateParams,
        ctx: &TxContext,
        _sink: &mut EventSink,
    ) -> Result<GenerateErasureCertificateResponse, IdentityError> {
        let caller = ctx.signer_account_id;
        let module_params = store::load_params(state)?;
        let request = self.load_erasure_request(state, &params.request_id)?;
        if caller != request.requester && caller != module_params.authority {
            return Err(IdentityError::Unauthorized(
                "only the requester or the authority may request a certificate".into(),
            ));
        }
        if !matches!(
            request.status,
            ErasureStatus::Completed | ErasureStatus::PartiallyCompleted
        ) {
            return Err(IdentityError::Precondition(format!(
                "erasure request {} has not been processed",
                params.request_id
            )));
        }

        let mut fingerprints: Vec<[u8; 32]> = Vec::new();
        let index_prefix = keys::key2(
            keys::KEY_DESTRUCTION_BY_ACCOUNT_PREFIX,
            request.requester.as_ref(),
            b"",
        );
        for (index_key, _) in store::collect_prefix(state, &index_prefix)? {
            let record_id = match String::from_utf8(index_key[index_prefix.len()..].to_vec()) {
                Ok(id) => id,
                Err(_) => continue,
            };
            let record: Option<KeyDestructionRecord> = store::get_typed(
                state,
                &keys::key1(keys::KEY_DESTRUCTION_PREFIX, record_id.as_bytes()),
            )?;
            if let Some(record) = record {
                if record.request_id == params.request_id {
                    fingerprints.extend(record.key_fingerprints);
                }
            }
        }

        let certificate = ErasureCertificate {
            request_id: request.request_id.clone(),
            requester: request.requester,
            status: request.status,
            categories_erased: request
                .erasure_report
                .as_ref()
                .map(|r| r.categories_erased.clone())
                .unwrap_or_default(),
            key_fingerprints: fingerprints,
            verification_hash: request.verification_hash,
            issued_at_height: ctx.block_height,
        };
        Ok(GenerateErasureCertificateResponse {
            certificate,
            height: ctx.block_height,
        })
    }

    /// End-of-block sweep: walks the pending-by-deadline index and processes
    /// every request whose deadline has arrived. Per-item failures are logged
    /// and skipped.
    pub fn process_overdue_erasure_requests(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) {
        let snapshot = match store::collect_prefix(state, &[keys::PENDING_ERASURE_PREFIX]) {
            Ok(s) => s,
            Err(e) => {
                log::error!("[veid] overdue erasure scan failed: {}", e);
                return;
            }
        };
        for (index_key, _) in snapshot {
            match keys::time_component(&index_key) {
                Some(deadline) if deadline <= ctx.block_time => {}
                _ => break,
            }
            let id_start = 1 + 8 + 1;
            let request_id = match index_key
                .get(id_start..)
                .and_then(|b| String::from_utf8(b.to_vec()).ok())
            {
                Some(id) => id,
                None => {
                    log::warn!("[veid] malformed pending erasure key; skipping");
                    continue;
                }
            };
            // A stale queue entry for an already-processed request is
            // removed without reprocessing.
            match self.load_erasure_request(state, &request_id) {
                Ok(request) if request.status == ErasureStatus::Pending => {}
                _ => {
                    if let Err(e) = state.delete(&index_key) {
                        log::warn!("[veid] failed to drop stale erasure queue entry: {}", e);
                    }
                    continue;
                }
            }
            match self.execute_erasure(state, &request_id, ctx, sink) {
                Ok(status) => {
                    log::info!(
                        "[veid] overdue erasure request {} processed: {:?}",
                        request_id,
                        status
                    );
                }
                Err(e) => {
                    log::warn!(
                        "[veid] overdue erasure request {} failed: {}",
                        request_id,
                        e
                    );
                }
            }
        }
    }
}
