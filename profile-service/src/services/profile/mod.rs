//! The profile read pipeline.
//!
//! Identity resolution, loading and the delegation gate are fatal steps.
//! Every other step is best-effort: a failing source is logged, counted in
//! `profile_step_degraded_total` and replaced by its empty value.

pub mod consent;
pub mod declarations;
pub mod degrade;
pub mod delegation;
pub mod external_ids;
pub mod identity;
pub mod loader;
pub mod locations;
pub mod organisations;
pub mod pii;
pub mod shaper;

use chrono::{Datelike, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::instrument;

use crate::dtos::{ProfileField, ProfileReadRequest, ProfileView, Requester};
use crate::models::user::location_ids;
use crate::models::{LocationRecord, OrgAffiliation, UserFlagsView};
use crate::services::config_snapshot::SnapshotStore;
use crate::services::decryption::Decryptor;
use crate::services::error::ServiceError;
use crate::services::jwt::TokenIssuer;
use crate::services::search::LocationSearch;
use crate::services::store::{ExternalIdentityStore, ProfileStore};

pub use consent::ConsentTracker;
pub use declarations::DeclarationReader;
pub use delegation::{DelegationAuthorizer, DelegationGrant};
pub use external_ids::ExternalIdentityMerger;
pub use identity::IdentityResolver;
pub use loader::ProfileLoader;
pub use locations::LocationHierarchyEnricher;
pub use organisations::OrgAffiliationEnricher;
pub use pii::{DecryptedContacts, PiiDecryptor};
pub use shaper::Projection;

use degrade::best_effort;

/// Everything the pipeline reads from.
#[derive(Clone)]
pub struct Collaborators {
    pub profiles: Arc<dyn ProfileStore>,
    pub identities: Arc<dyn ExternalIdentityStore>,
    pub search: Arc<dyn LocationSearch>,
    pub decryptor: Arc<dyn Decryptor>,
    pub tokens: Arc<dyn TokenIssuer>,
    pub snapshots: Arc<SnapshotStore>,
}

#[derive(Clone)]
pub struct ProfileReadService {
    identity: IdentityResolver,
    loader: ProfileLoader,
    organisations: OrgAffiliationEnricher,
    locations: LocationHierarchyEnricher,
    external_ids: ExternalIdentityMerger,
    declarations: DeclarationReader,
    delegation: DelegationAuthorizer,
    pii: PiiDecryptor,
    snapshots: Arc<SnapshotStore>,
}

impl ProfileReadService {
    pub fn new(collaborators: Collaborators) -> Self {
        let Collaborators {
            profiles,
            identities,
            search,
            decryptor,
            tokens,
            snapshots,
        } = collaborators;

        let pii = PiiDecryptor::new(decryptor);
        let locations = LocationHierarchyEnricher::new(profiles.clone(), search);
        Self {
            identity: IdentityResolver::new(identities.clone()),
            loader: ProfileLoader::new(profiles.clone()),
            organisations: OrgAffiliationEnricher::new(profiles.clone(), locations.clone()),
            external_ids: ExternalIdentityMerger::new(identities, pii.clone(), locations.clone()),
            declarations: DeclarationReader::new(profiles, pii.clone()),
            delegation: DelegationAuthorizer::new(tokens),
            locations,
            pii,
            snapshots,
        }
    }

    /// Read one profile and shape it for the requested contract.
    #[instrument(
        skip(self, request, requester),
        fields(id = %request.user_id, version = request.version.as_str(), private = request.private)
    )]
    pub async fn read(
        &self,
        request: &ProfileReadRequest,
        requester: &Requester,
    ) -> Result<Map<String, Value>, ServiceError> {
        let snapshot = self.snapshots.current().await;
        let request_id = requester.request_id.as_deref();
        let fields = &request.fields;

        let user_id = self.identity.resolve(request).await?;
        let profile = self.loader.load(&user_id).await?;
        let grant = self
            .delegation
            .authorize(requester, &profile, request.private)?;

        let user_type = shaper::parse_user_type(profile.profile_user_type.as_deref(), &user_id);
        let profile_location =
            shaper::parse_profile_location(profile.profile_location.as_deref(), &user_id);
        let declared_location_ids = location_ids(&profile_location);

        let external_ids_merge = if requester.is_reading_self(&user_id) && !fields.is_present() {
            Some(true)
        } else if fields.contains(ProfileField::ExternalIds) {
            Some(false)
        } else {
            None
        };

        let organisations = async {
            let affiliations =
                best_effort("organisations", &user_id, self.organisations.load_affiliations(&user_id))
                    .await;
            if fields.contains(ProfileField::Organisations) {
                self.organisations
                    .enrich_with_details(&user_id, affiliations)
                    .await
            } else {
                affiliations
            }
        };
        let root_org = async {
            match profile.root_org_id.as_deref().filter(|id| !id.trim().is_empty()) {
                Some(root_id) => {
                    best_effort("root_org", &user_id, self.organisations.load_root_org(root_id))
                        .await
                }
                None => None,
            }
        };
        let user_locations = async {
            if !fields.contains(ProfileField::Locations) || declared_location_ids.is_empty() {
                return Vec::new();
            }
            best_effort(
                "user_locations",
                &user_id,
                self.locations.resolve(&declared_location_ids),
            )
            .await
        };
        let external_ids = async {
            match external_ids_merge {
                Some(merge) => Some(
                    best_effort(
                        "external_ids",
                        &user_id,
                        self.external_ids.merge(&profile, merge, request_id),
                    )
                    .await,
                ),
                None => None,
            }
        };
        let declarations = async {
            if fields.contains(ProfileField::Declarations) {
                Some(
                    best_effort(
                        "declarations",
                        &user_id,
                        self.declarations.load(&user_id, request_id),
                    )
                    .await,
                )
            } else {
                None
            }
        };
        let managed_token = self
            .delegation
            .attach_token(&grant, requester, request.with_tokens);
        let contacts = self.pii.decrypt_profile(&profile, request_id);

        let (
            organisations,
            root_org,
            user_locations,
            external_ids,
            declarations,
            managed_token,
            contacts,
        ) = tokio::join!(
            organisations,
            root_org,
            user_locations,
            external_ids,
            declarations,
            managed_token,
            contacts
        );

        let user_locations = self
            .finish_user_locations(
                user_locations,
                &organisations,
                request,
                profile.root_org_id.as_deref(),
                request_id,
            )
            .await;

        let consent = ConsentTracker::compute(
            &snapshot,
            profile.tnc_accepted_version.as_deref(),
            profile.tnc_accepted_on,
        );

        let mut view = ProfileView {
            id: profile.id.clone(),
            identifier: user_id.clone(),
            user_id: profile.id.clone(),
            user_name: profile.user_name,
            first_name: profile.first_name,
            last_name: profile.last_name,
            email: contacts.email,
            phone: contacts.phone,
            masked_email: profile.masked_email,
            masked_phone: profile.masked_phone,
            recovery_email: contacts.recovery_email,
            recovery_phone: contacts.recovery_phone,
            prev_used_email: contacts.prev_used_email,
            prev_used_phone: contacts.prev_used_phone,
            enc_email: profile.email.filter(|_| request.private),
            enc_phone: profile.phone.filter(|_| request.private),
            root_org_id: profile.root_org_id,
            root_org,
            channel: profile.channel,
            profile_user_type: user_type.clone(),
            profile_location,
            managed_by: profile.managed_by,
            managed_token,
            tnc_accepted_version: profile.tnc_accepted_version,
            tnc_accepted_on: profile.tnc_accepted_on,
            all_tnc_accepted: (!profile.all_tnc_accepted.is_empty())
                .then(|| shaper::parse_accepted_terms(&profile.all_tnc_accepted)),
            flags_value: profile.flags_value,
            flags: UserFlagsView::from(profile.flags),
            is_minor: shaper::is_minor(profile.dob.as_deref(), Utc::now().year()),
            dob: profile.dob,
            status: profile.status,
            framework: profile.framework,
            created_date: profile.created_date,
            updated_date: profile.updated_date,
            organisations,
            external_ids,
            last_login_time: fields.is_present().then_some(0),
            topics: fields.contains(ProfileField::Topic).then(Vec::new),
            role_list: fields
                .contains(ProfileField::Roles)
                .then(|| snapshot.user_read_roles.clone()),
            user_locations,
            declarations,
            ..Default::default()
        };
        if let Some(consent) = consent {
            view.apply_consent(consent);
        }

        let projection = Projection {
            version: request.version,
            user_type,
            location_ids: declared_location_ids,
        };
        projection
            .apply(&view)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to shape profile: {}", e)))
    }

    /// Resolved user locations, with inferred schools appended when
    /// organisation detail was requested. `None` when nothing resolved.
    async fn finish_user_locations(
        &self,
        mut resolved: Vec<LocationRecord>,
        organisations: &[OrgAffiliation],
        request: &ProfileReadRequest,
        root_org_id: Option<&str>,
        request_id: Option<&str>,
    ) -> Option<Vec<LocationRecord>> {
        if resolved.is_empty() {
            return None;
        }
        if request.fields.contains(ProfileField::Organisations) {
            self.locations
                .infer_schools(&mut resolved, organisations, root_org_id, request_id)
                .await;
        }
        Some(resolved)
    }
}
