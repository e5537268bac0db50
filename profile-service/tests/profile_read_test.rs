mod common;

use chrono::{Datelike, Utc};
use common::{TNC_CONFIG, TestApp, encrypted, location, request, user};
use profile_service::dtos::{ApiVersion, ProfileReadRequest, Requester};
use profile_service::models::{
    DeclarationRow, ExternalIdentityRow, OrganisationRecord, Role, UserOrgRow, UserRecord,
};
use profile_service::services::ServiceError;
use profile_service::services::profile::shaper::{ORG_DEFAULT_KEYS, USER_DEFAULT_KEYS};
use serde_json::{Value, json};
use sqlx::types::Json;
use std::collections::{BTreeMap, HashMap};

fn managed_user(id: &str, owner: &str) -> UserRecord {
    UserRecord {
        managed_by: Some(owner.to_string()),
        ..user(id)
    }
}

#[tokio::test]
async fn test_minor_boundary_follows_birth_year() {
    let app = TestApp::new();
    let year = Utc::now().year();
    app.store.insert_user(UserRecord {
        dob: Some(format!("{}-12-31", year - 19)),
        ..user("young")
    });
    app.store.insert_user(UserRecord {
        dob: Some(format!("{}-12-31", year - 20)),
        ..user("adult")
    });
    app.store.insert_user(UserRecord {
        dob: Some("unknown".to_string()),
        ..user("undated")
    });

    let requester = Requester::default();
    let young = app
        .read(&request("young", ApiVersion::V4, None), &requester)
        .await
        .unwrap();
    let adult = app
        .read(&request("adult", ApiVersion::V4, None), &requester)
        .await
        .unwrap();
    let undated = app
        .read(&request("undated", ApiVersion::V4, None), &requester)
        .await
        .unwrap();

    assert_eq!(young["isMinor"], true);
    assert_eq!(adult["isMinor"], false);
    assert!(undated.get("isMinor").is_none());
}

#[tokio::test]
async fn test_missing_and_locked_users_are_fatal() {
    let app = TestApp::new();
    app.store.insert_user(UserRecord {
        is_locked: Some(true),
        ..user("locked")
    });

    let missing = app
        .read(&request("nobody", ApiVersion::V4, None), &Requester::default())
        .await;
    assert!(matches!(missing, Err(ServiceError::UserNotFound)));

    let locked = app
        .read(&request("locked", ApiVersion::V4, None), &Requester::default())
        .await;
    assert!(matches!(locked, Err(ServiceError::AccountLocked)));
}

#[tokio::test]
async fn test_provider_lookup_resolves_canonical_id() {
    let app = TestApp::new();
    app.store.insert_user(user("u1"));
    app.store.insert_external_id(ExternalIdentityRow {
        user_id: "u1".to_string(),
        external_id: Some("t-100".to_string()),
        id_type: Some("teacher-id".to_string()),
        provider: Some("org-x".to_string()),
        ..Default::default()
    });

    let mut by_provider = request("T-100", ApiVersion::V4, None);
    by_provider.provider = Some("org-x".to_string());
    by_provider.id_type = Some("teacher-id".to_string());
    let profile = app.read(&by_provider, &Requester::default()).await.unwrap();
    assert_eq!(profile["identifier"], "u1");
    assert_eq!(profile["id"], "u1");

    by_provider.id_type = None;
    let missing_type = app.read(&by_provider, &Requester::default()).await;
    assert!(matches!(missing_type, Err(ServiceError::MissingParameter(p)) if p == "idType"));

    by_provider.id_type = Some("teacher-id".to_string());
    by_provider.user_id = "t-999".to_string();
    let unknown = app.read(&by_provider, &Requester::default()).await;
    assert!(matches!(
        unknown,
        Err(ServiceError::ExternalIdentityNotFound { id, .. }) if id == "t-999"
    ));
}

#[tokio::test]
async fn test_managed_account_visible_to_owner_or_private_view() {
    let app = TestApp::new();
    app.store.insert_user(managed_user("child", "parent"));

    let public = request("child", ApiVersion::V4, None);
    let stranger = app.read(&public, &Requester::new("stranger")).await;
    assert!(matches!(stranger, Err(ServiceError::Unauthorized)));

    let anonymous = app.read(&public, &Requester::default()).await;
    assert!(matches!(anonymous, Err(ServiceError::Unauthorized)));

    let owner = app.read(&public, &Requester::new("parent")).await.unwrap();
    assert_eq!(owner["managedBy"], "parent");

    let mut private = request("child", ApiVersion::V4, None);
    private.private = true;
    assert!(app.read(&private, &Requester::new("stranger")).await.is_ok());
}

#[tokio::test]
async fn test_managed_token_echo_issue_and_absence() {
    let app = TestApp::new();
    app.store.insert_user(managed_user("child", "parent"));
    app.store.insert_user(user("solo"));

    let mut with_tokens = request("child", ApiVersion::V4, None);
    with_tokens.with_tokens = true;

    let issued = app
        .read(&with_tokens, &Requester::new("parent"))
        .await
        .unwrap();
    assert_eq!(issued["managedToken"], "managed:parent:child");
    assert_eq!(app.tokens.issued_count(), 1);

    let echoing = Requester {
        managed_token: Some("gateway-token".to_string()),
        ..Requester::new("parent")
    };
    let echoed = app.read(&with_tokens, &echoing).await.unwrap();
    assert_eq!(echoed["managedToken"], "gateway-token");
    assert_eq!(app.tokens.issued_count(), 1);

    let without = app
        .read(&request("child", ApiVersion::V4, None), &Requester::new("parent"))
        .await
        .unwrap();
    assert!(without.get("managedToken").is_none());

    let mut unmanaged = request("solo", ApiVersion::V4, None);
    unmanaged.with_tokens = true;
    let solo = app.read(&unmanaged, &Requester::new("solo")).await.unwrap();
    assert!(solo.get("managedToken").is_none());
}

#[tokio::test]
async fn test_token_issuer_failure_leaves_token_out() {
    let app = TestApp::builder().failing_tokens().build();
    app.store.insert_user(managed_user("child", "parent"));

    let mut with_tokens = request("child", ApiVersion::V4, None);
    with_tokens.with_tokens = true;
    let profile = app
        .read(&with_tokens, &Requester::new("parent"))
        .await
        .unwrap();
    assert!(profile.get("managedToken").is_none());
    assert_eq!(profile["id"], "child");
}

#[tokio::test]
async fn test_consent_prompt_against_snapshot() {
    let app = TestApp::new();
    let accepted_on = Utc::now();
    app.store.insert_user(UserRecord {
        tnc_accepted_version: Some("V2".to_string()),
        tnc_accepted_on: Some(accepted_on),
        ..user("current")
    });
    app.store.insert_user(UserRecord {
        tnc_accepted_version: Some("v1".to_string()),
        tnc_accepted_on: Some(accepted_on),
        ..user("outdated")
    });
    app.store.insert_user(UserRecord {
        tnc_accepted_version: Some("v2".to_string()),
        ..user("undated")
    });

    let requester = Requester::default();
    let before = app
        .read(&request("current", ApiVersion::V4, None), &requester)
        .await
        .unwrap();
    assert!(before.get("promptTnc").is_none());
    assert!(before.get("tncLatestVersion").is_none());

    app.publish_tnc(TNC_CONFIG).await;

    let current = app
        .read(&request("current", ApiVersion::V4, None), &requester)
        .await
        .unwrap();
    assert_eq!(current["promptTnc"], false);
    assert_eq!(current["tncLatestVersion"], "v2");
    assert_eq!(
        current["tncLatestVersionUrl"],
        "https://example.org/terms/v2.html"
    );

    for id in ["outdated", "undated"] {
        let profile = app
            .read(&request(id, ApiVersion::V4, None), &requester)
            .await
            .unwrap();
        assert_eq!(profile["promptTnc"], true, "{}", id);
    }
}

#[tokio::test]
async fn test_consent_unknown_latest_version_never_prompts() {
    let app = TestApp::new();
    app.store.insert_user(user("u1"));
    app.publish_tnc(r#"{"latestVersion": "v9", "v1": {"url": "x"}}"#)
        .await;

    let profile = app
        .read(&request("u1", ApiVersion::V4, None), &Requester::default())
        .await
        .unwrap();
    assert_eq!(profile["promptTnc"], false);
    assert_eq!(profile["tncLatestVersion"], "v9");
}

#[tokio::test]
async fn test_malformed_consent_config_is_left_out() {
    let app = TestApp::new();
    app.store.insert_user(user("u1"));
    app.publish_tnc("not json").await;

    let profile = app
        .read(&request("u1", ApiVersion::V4, None), &Requester::default())
        .await
        .unwrap();
    assert!(profile.get("promptTnc").is_none());
    assert_eq!(profile["id"], "u1");
}

#[tokio::test]
async fn test_feature_flags_and_association_bits_decode_independently() {
    let app = TestApp::new();
    app.store.insert_user(UserRecord {
        flags_value: Some(5),
        ..user("u1")
    });
    for (id, bits) in [("m1", Some(1)), ("m2", Some(6)), ("m3", None)] {
        app.store.insert_user_org(UserOrgRow {
            id: id.to_string(),
            user_id: "u1".to_string(),
            organisation_id: format!("org-{}", id),
            association_type: bits,
            ..Default::default()
        });
    }
    app.store.insert_user_org(UserOrgRow {
        id: "gone".to_string(),
        user_id: "u1".to_string(),
        organisation_id: "org-gone".to_string(),
        is_deleted: Some(true),
        ..Default::default()
    });

    let profile = app
        .read(&request("u1", ApiVersion::V4, None), &Requester::default())
        .await
        .unwrap();

    assert_eq!(profile["flagsValue"], 5);
    assert_eq!(profile["phoneVerified"], true);
    assert_eq!(profile["emailVerified"], false);
    assert_eq!(profile["stateValidated"], true);

    let orgs = profile["organisations"].as_array().unwrap();
    assert_eq!(orgs.len(), 3);
    let by_id = |id: &str| orgs.iter().find(|o| o["id"] == id).unwrap().clone();

    let sso = by_id("m1");
    assert_eq!(sso["isSSO"], true);
    assert_eq!(sso["isSelfDeclaration"], false);
    assert_eq!(sso["isSystemUpload"], false);

    let declared_and_uploaded = by_id("m2");
    assert_eq!(declared_and_uploaded["isSSO"], false);
    assert_eq!(declared_and_uploaded["isSelfDeclaration"], true);
    assert_eq!(declared_and_uploaded["isSystemUpload"], true);

    let untyped = by_id("m3");
    assert!(untyped.get("isSSO").is_none());
}

#[tokio::test]
async fn test_repeated_reads_are_identical() {
    let app = TestApp::new();
    app.publish_tnc(TNC_CONFIG).await;
    app.store.insert_user(UserRecord {
        profile_location: Some(r#"[{"id":"loc1"}]"#.to_string()),
        email: Some(encrypted("asha@example.org")),
        ..user("u1")
    });
    app.store.insert_location(location("loc1", "state", "TN"));

    let read = request("u1", ApiVersion::V3, Some("organisations,locations,topic"));
    let first = app.read(&read, &Requester::new("u1")).await.unwrap();
    let second = app.read(&read, &Requester::new("u1")).await.unwrap();

    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
}

#[tokio::test]
async fn test_user_locations_replace_scratch_fields() {
    let app = TestApp::new();
    app.store.insert_user(UserRecord {
        profile_location: Some(r#"[{"id":"loc1","type":"state"},{"id":"loc2"}]"#.to_string()),
        ..user("u1")
    });
    app.store.insert_location(location("loc1", "state", "TN"));
    app.store.insert_location(location("loc2", "district", "CHN"));

    for version in [ApiVersion::V3, ApiVersion::V4] {
        let profile = app
            .read(
                &request("u1", version, Some("locations")),
                &Requester::default(),
            )
            .await
            .unwrap();

        let locations = profile["userLocations"].as_array().unwrap();
        let ids: Vec<&str> = locations.iter().filter_map(|l| l["id"].as_str()).collect();
        assert_eq!(ids, vec!["loc1", "loc2"]);
        assert_eq!(locations[0]["code"], "TN");
        assert_eq!(locations[1]["type"], "district");
        assert!(profile.get("locationIds").is_none());
        assert!(profile.get("profileLocation").is_none());
    }
}

#[tokio::test]
async fn test_unresolved_locations_keep_declared_ids() {
    let app = TestApp::new();
    app.store.insert_user(UserRecord {
        profile_location: Some(r#"[{"id":"loc1"}]"#.to_string()),
        ..user("u1")
    });

    let profile = app
        .read(
            &request("u1", ApiVersion::V3, Some("locations")),
            &Requester::default(),
        )
        .await
        .unwrap();
    assert!(profile.get("userLocations").is_none());
    assert_eq!(profile["locationIds"], json!(["loc1"]));
    assert_eq!(profile["profileLocation"], json!([{"id": "loc1"}]));
}

#[tokio::test]
async fn test_location_store_failure_degrades() {
    let app = TestApp::new();
    app.store.insert_user(UserRecord {
        profile_location: Some(r#"[{"id":"loc1"}]"#.to_string()),
        ..user("u1")
    });
    app.store.fail_on("find_locations");

    let profile = app
        .read(
            &request("u1", ApiVersion::V4, Some("locations")),
            &Requester::default(),
        )
        .await
        .unwrap();
    assert!(profile.get("userLocations").is_none());
    assert_eq!(profile["id"], "u1");
}

fn seed_school_scenario(app: &TestApp) {
    app.store.insert_user(UserRecord {
        profile_location: Some(
            r#"[{"id":"in"},{"id":"tn"},{"id":"chn"}]"#.to_string(),
        ),
        ..user("u1")
    });
    app.store.insert_location(location("in", "country", "IN"));
    app.store.insert_location(location("tn", "state", "TN"));
    app.store.insert_location(location("chn", "district", "CHN"));

    for (membership, org) in [("m-root", "root-org"), ("m-school", "school-org")] {
        app.store.insert_user_org(UserOrgRow {
            id: membership.to_string(),
            user_id: "u1".to_string(),
            organisation_id: org.to_string(),
            ..Default::default()
        });
    }
    app.store.insert_organisation(OrganisationRecord {
        id: "root-org".to_string(),
        org_name: Some("Tamil Nadu".to_string()),
        channel: Some("tn".to_string()),
        external_id: Some("TN-ROOT".to_string()),
        is_tenant: Some(true),
        ..Default::default()
    });
    app.store.insert_organisation(OrganisationRecord {
        id: "school-org".to_string(),
        org_name: Some("Government School".to_string()),
        external_id: Some("SCH-1".to_string()),
        organisation_type: Some(2),
        org_location: Some(r#"[{"id":"tn"},{"id":"missing"},{"id":"chn"}]"#.to_string()),
        ..Default::default()
    });
}

#[tokio::test]
async fn test_school_inferred_for_deep_hierarchy() {
    let school = profile_service::models::LocationRecord {
        name: Some("Government School".to_string()),
        ..location("sch", "school", "SCH-1")
    };
    let app = TestApp::builder().search_results(vec![school]).build();
    seed_school_scenario(&app);

    let profile = app
        .read(
            &request("u1", ApiVersion::V4, Some("organisations,locations")),
            &Requester::default(),
        )
        .await
        .unwrap();

    let ids: Vec<&str> = profile["userLocations"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|l| l["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["in", "tn", "chn", "sch"]);

    // Only the non-root organisation is searched.
    let calls = app.search.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["code"], "SCH-1");
    assert_eq!(calls[0]["type"], "school");

    let orgs = profile["organisations"].as_array().unwrap();
    let school_org = orgs.iter().find(|o| o["organisationId"] == "school-org").unwrap();
    assert_eq!(school_org["orgName"], "Government School");
    assert_eq!(school_org["isSchool"], true);
    let org_location_ids: Vec<&str> = school_org["locations"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|l| l["id"].as_str())
        .collect();
    assert_eq!(org_location_ids, vec!["tn", "chn"]);
}

#[tokio::test]
async fn test_organisation_locations_resolve_in_one_batch() {
    let app = TestApp::new();
    app.store.insert_user(user("u1"));
    app.store.insert_location(location("tn", "state", "TN"));
    app.store.insert_location(location("chn", "district", "CHN"));
    app.store.insert_location(location("mdu", "district", "MDU"));

    for (membership, org, locations) in [
        ("m1", "school-a", r#"[{"id":"tn"},{"id":"chn"}]"#),
        ("m2", "school-b", r#"[{"id":"tn"},{"id":"mdu"}]"#),
    ] {
        app.store.insert_user_org(UserOrgRow {
            id: membership.to_string(),
            user_id: "u1".to_string(),
            organisation_id: org.to_string(),
            ..Default::default()
        });
        app.store.insert_organisation(OrganisationRecord {
            id: org.to_string(),
            org_name: Some(org.to_string()),
            org_location: Some(locations.to_string()),
            ..Default::default()
        });
    }

    let profile = app
        .read(
            &request("u1", ApiVersion::V4, Some("organisations")),
            &Requester::default(),
        )
        .await
        .unwrap();

    assert_eq!(app.store.calls("find_locations"), 1);
    let orgs = profile["organisations"].as_array().unwrap();
    assert_eq!(orgs.len(), 2);
    for (org, expected) in [("school-a", ["tn", "chn"]), ("school-b", ["tn", "mdu"])] {
        let entry = orgs.iter().find(|o| o["organisationId"] == org).unwrap();
        let ids: Vec<&str> = entry["locations"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|l| l["id"].as_str())
            .collect();
        assert_eq!(ids, expected);
    }
}

#[tokio::test]
async fn test_school_search_failure_is_skipped() {
    let app = TestApp::builder().failing_search().build();
    seed_school_scenario(&app);

    let profile = app
        .read(
            &request("u1", ApiVersion::V4, Some("organisations,locations")),
            &Requester::default(),
        )
        .await
        .unwrap();
    assert_eq!(profile["userLocations"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_school_not_inferred_without_organisation_detail() {
    let app = TestApp::builder()
        .search_results(vec![location("sch", "school", "SCH-1")])
        .build();
    seed_school_scenario(&app);

    let profile = app
        .read(
            &request("u1", ApiVersion::V4, Some("locations")),
            &Requester::default(),
        )
        .await
        .unwrap();
    assert_eq!(profile["userLocations"].as_array().unwrap().len(), 3);
    assert!(app.search.calls().is_empty());
}

#[tokio::test]
async fn test_declared_email_is_decrypted_without_provenance() {
    let app = TestApp::new();
    app.store.insert_user(user("u1"));
    app.store.insert_external_id(ExternalIdentityRow {
        user_id: "u1".to_string(),
        external_id: Some("normalised".to_string()),
        id_type: Some("declaredemail".to_string()),
        provider: Some("org9".to_string()),
        original_external_id: Some(encrypted("asha@example.org")),
        original_id_type: Some("declaredEmail".to_string()),
        original_provider: Some("org9".to_string()),
        created_by: Some("admin".to_string()),
        ..Default::default()
    });

    let profile = app
        .read(&request("u1", ApiVersion::V4, None), &Requester::new("u1"))
        .await
        .unwrap();

    let external_ids = profile["externalIds"].as_array().unwrap();
    assert_eq!(external_ids.len(), 1);
    assert_eq!(
        external_ids[0],
        json!({"id": "asha@example.org", "idType": "declaredEmail", "provider": "org9"})
    );
}

#[tokio::test]
async fn test_external_ids_only_for_self_or_when_requested() {
    let app = TestApp::new();
    app.store.insert_user(user("u1"));
    app.store.insert_external_id(ExternalIdentityRow {
        user_id: "u1".to_string(),
        external_id: Some("t-1".to_string()),
        id_type: Some("teacher-id".to_string()),
        provider: Some("org9".to_string()),
        ..Default::default()
    });

    let other = app
        .read(&request("u1", ApiVersion::V4, None), &Requester::new("u2"))
        .await
        .unwrap();
    assert!(other.get("externalIds").is_none());

    let requested = app
        .read(
            &request("u1", ApiVersion::V4, Some("externalIds")),
            &Requester::new("u2"),
        )
        .await
        .unwrap();
    assert_eq!(requested["externalIds"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_external_id_decrypt_failure_empties_list() {
    let app = TestApp::builder().failing_decryptor().build();
    app.store.insert_user(user("u1"));
    app.store.insert_external_id(ExternalIdentityRow {
        user_id: "u1".to_string(),
        original_external_id: Some(encrypted("9999999999")),
        original_id_type: Some("declared-phone".to_string()),
        original_provider: Some("org9".to_string()),
        ..Default::default()
    });

    let profile = app
        .read(&request("u1", ApiVersion::V4, None), &Requester::new("u1"))
        .await
        .unwrap();
    assert_eq!(profile["externalIds"], json!([]));
}

#[tokio::test]
async fn test_root_provider_rows_take_channel_label() {
    let app = TestApp::new();
    app.store.insert_user(user("u1"));
    app.store.insert_external_id(ExternalIdentityRow {
        user_id: "u1".to_string(),
        external_id: Some("t-1".to_string()),
        id_type: Some("root-org".to_string()),
        provider: Some("root-org".to_string()),
        ..Default::default()
    });

    let profile = app
        .read(&request("u1", ApiVersion::V4, None), &Requester::new("u1"))
        .await
        .unwrap();
    assert_eq!(
        profile["externalIds"],
        json!([{"id": "t-1", "idType": "tn", "provider": "tn"}])
    );
}

#[tokio::test]
async fn test_declared_district_resolves_to_location_code() {
    let app = TestApp::new();
    app.store.insert_user(user("u1"));
    app.store.insert_location(location("chn", "district", "CHN"));
    app.store.insert_external_id(ExternalIdentityRow {
        user_id: "u1".to_string(),
        original_external_id: Some("chn".to_string()),
        original_id_type: Some("declared-district".to_string()),
        original_provider: Some("org9".to_string()),
        ..Default::default()
    });
    app.store.insert_external_id(ExternalIdentityRow {
        user_id: "u1".to_string(),
        original_external_id: Some("nowhere".to_string()),
        original_id_type: Some("declared-state".to_string()),
        original_provider: Some("org9".to_string()),
        ..Default::default()
    });

    let profile = app
        .read(&request("u1", ApiVersion::V4, None), &Requester::new("u1"))
        .await
        .unwrap();
    let ids: Vec<&str> = profile["externalIds"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["CHN", "nowhere"]);
}

#[tokio::test]
async fn test_current_contract_strips_default_block() {
    let app = TestApp::new();
    app.store.insert_user(UserRecord {
        profile_user_type: Some(r#"{"type":"teacher","subType":"hm"}"#.to_string()),
        ..user("u1")
    });
    app.store.insert_organisation(OrganisationRecord {
        id: "root-org".to_string(),
        org_name: Some("Tamil Nadu".to_string()),
        channel: Some("tn".to_string()),
        ..Default::default()
    });

    let read = |version| request("u1", version, Some("topic"));
    let legacy = app
        .read(&read(ApiVersion::V3), &Requester::default())
        .await
        .unwrap();
    let current = app
        .read(&read(ApiVersion::V4), &Requester::default())
        .await
        .unwrap();

    assert_eq!(legacy["countryCode"], "+91");
    assert_eq!(legacy["lastLoginTime"], 0);
    assert_eq!(legacy["userType"], "teacher");
    assert_eq!(legacy["userSubType"], "hm");
    assert_eq!(legacy["rootOrg"]["orgName"], "Tamil Nadu");
    for key in ORG_DEFAULT_KEYS {
        assert!(legacy["rootOrg"].get(*key).is_some(), "{}", key);
    }

    for key in USER_DEFAULT_KEYS {
        assert!(current.get(*key).is_none(), "{}", key);
    }
    for key in ["userType", "userSubType", "locationIds"] {
        assert!(current.get(key).is_none(), "{}", key);
    }
    for key in ORG_DEFAULT_KEYS {
        assert!(current["rootOrg"].get(*key).is_none(), "{}", key);
    }
    assert_eq!(current["profileUserType"]["type"], "teacher");
    assert_eq!(current["topics"], json!([]));
}

#[tokio::test]
async fn test_missing_root_org_is_null() {
    let app = TestApp::new();
    app.store.insert_user(user("u1"));

    let profile = app
        .read(&request("u1", ApiVersion::V3, None), &Requester::default())
        .await
        .unwrap();
    assert_eq!(profile["rootOrg"], Value::Null);
    assert_eq!(profile["rootOrgId"], "root-org");
}

#[tokio::test]
async fn test_last_login_placeholder_only_with_fields() {
    let app = TestApp::new();
    app.store.insert_user(user("u1"));

    let unknown_only = app
        .read(
            &request("u1", ApiVersion::V3, Some("bogus, nothing")),
            &Requester::default(),
        )
        .await
        .unwrap();
    assert_eq!(unknown_only["lastLoginTime"], 0);
    assert!(unknown_only.get("topics").is_none());
    assert!(unknown_only.get("roleList").is_none());

    let without_fields = app
        .read(&request("u1", ApiVersion::V3, None), &Requester::default())
        .await
        .unwrap();
    assert_eq!(without_fields["lastLoginTime"], Value::Null);
}

#[tokio::test]
async fn test_malformed_user_type_reads_as_empty() {
    let app = TestApp::new();
    app.store.insert_user(UserRecord {
        profile_user_type: Some("{not json".to_string()),
        profile_location: Some("also not json".to_string()),
        ..user("u1")
    });

    let profile = app
        .read(&request("u1", ApiVersion::V3, None), &Requester::default())
        .await
        .unwrap();
    assert_eq!(profile["profileUserType"], json!({}));
    assert_eq!(profile["userType"], Value::Null);
    assert_eq!(profile["profileLocation"], json!([]));
    assert_eq!(profile["locationIds"], json!([]));
}

#[tokio::test]
async fn test_private_view_exposes_ciphertext() {
    let app = TestApp::new();
    let cipher = encrypted("asha@example.org");
    app.store.insert_user(UserRecord {
        email: Some(cipher.clone()),
        phone: Some(encrypted("9876543210")),
        password: Some("hash".to_string()),
        security_answer: Some("blue".to_string()),
        ..user("u1")
    });

    let mut private = request("u1", ApiVersion::V4, None);
    private.private = true;
    let profile = app.read(&private, &Requester::default()).await.unwrap();
    assert_eq!(profile["email"], "asha@example.org");
    assert_eq!(profile["phone"], "9876543210");
    assert_eq!(profile["encEmail"], cipher.as_str());
    assert!(profile.get("securityAnswer").is_none());
    assert!(profile.get("password").is_none());

    let public = app
        .read(&request("u1", ApiVersion::V4, None), &Requester::default())
        .await
        .unwrap();
    assert_eq!(public["email"], "asha@example.org");
    assert!(public.get("encEmail").is_none());
    assert!(public.get("encPhone").is_none());
}

#[tokio::test]
async fn test_contact_decrypt_failure_omits_field() {
    let app = TestApp::builder().failing_decryptor().build();
    app.store.insert_user(UserRecord {
        email: Some(encrypted("asha@example.org")),
        ..user("u1")
    });

    let profile = app
        .read(&request("u1", ApiVersion::V4, None), &Requester::default())
        .await
        .unwrap();
    assert_eq!(profile["email"], Value::Null);
    assert_eq!(profile["id"], "u1");
}

#[tokio::test]
async fn test_declarations_decrypt_declared_contacts() {
    let app = TestApp::new();
    app.store.insert_user(user("u1"));
    app.store.insert_declaration(DeclarationRow {
        user_id: "u1".to_string(),
        org_id: Some("org9".to_string()),
        persona: Some("teacher".to_string()),
        status: Some("PENDING".to_string()),
        user_info: Some(Json(BTreeMap::from([
            ("declared-email".to_string(), encrypted("asha@example.org")),
            ("declared-school-name".to_string(), "GHS".to_string()),
        ]))),
        ..Default::default()
    });

    let profile = app
        .read(
            &request("u1", ApiVersion::V4, Some("declarations")),
            &Requester::default(),
        )
        .await
        .unwrap();
    let declarations = profile["declarations"].as_array().unwrap();
    assert_eq!(declarations.len(), 1);
    assert_eq!(declarations[0]["orgId"], "org9");
    assert_eq!(declarations[0]["info"]["declared-email"], "asha@example.org");
    assert_eq!(declarations[0]["info"]["declared-school-name"], "GHS");
}

#[tokio::test]
async fn test_roles_and_accepted_terms() {
    let app = TestApp::new();
    app.publish_roles(vec![Role {
        id: "PUBLIC".to_string(),
        name: "Public".to_string(),
    }])
    .await;
    app.store.insert_user(UserRecord {
        all_tnc_accepted: Some(Json(HashMap::from([
            (
                "groupsTnc".to_string(),
                r#"{"version":"3.4.0","tncAcceptedOn":"2024-01-01"}"#.to_string(),
            ),
            ("orgAdminTnc".to_string(), "v1".to_string()),
        ]))),
        ..user("u1")
    });

    let profile = app
        .read(
            &request("u1", ApiVersion::V4, Some("roles")),
            &Requester::default(),
        )
        .await
        .unwrap();
    assert_eq!(profile["roleList"], json!([{"id": "PUBLIC", "name": "Public"}]));
    assert_eq!(profile["allTncAccepted"]["groupsTnc"]["version"], "3.4.0");
    assert_eq!(profile["allTncAccepted"]["orgAdminTnc"], "v1");
}

#[tokio::test]
async fn test_organisation_store_failure_degrades_to_empty() {
    let app = TestApp::new();
    app.store.insert_user(user("u1"));
    app.store.insert_user_org(UserOrgRow {
        id: "m1".to_string(),
        user_id: "u1".to_string(),
        organisation_id: "root-org".to_string(),
        ..Default::default()
    });
    app.store.fail_on("find_user_orgs");

    let read: ProfileReadRequest = request("u1", ApiVersion::V4, Some("organisations"));
    let profile = app.read(&read, &Requester::default()).await.unwrap();
    assert_eq!(profile["organisations"], json!([]));
}
