use mongodb_operator::authentication::credentials::generate_keyfile_contents;
use mongodb_operator::authentication::x509::{is_valid_subject, subject_from_pem};
use mongodb_operator::{
    disable, enable, AuthError, AuthMechanism, AuthOptions, AutomationConfig, ReplicaSetTopology,
    UserSpec, AGENT_NAME,
};
use rcgen::{CertificateParams, DistinguishedName, DnType, DnValue, KeyPair};

fn base_config() -> AutomationConfig {
    ReplicaSetTopology::new("my-rs", "mongodb", 3, "6.0.5")
        .build()
        .unwrap()
}

fn scram_options(mechanisms: Vec<AuthMechanism>) -> AuthOptions {
    let mut options = AuthOptions::new("my-rs", mechanisms);
    options.agent_password = "agent-password".to_string();
    options.keyfile_contents = "a".repeat(500);
    options
}

fn users() -> Vec<UserSpec> {
    vec![
        UserSpec::new("admin", "admin")
            .with_role("root", "admin")
            .with_password("pencil"),
        UserSpec::new("CN=app,OU=ENG,O=MongoDB,C=US", "$external").with_role("read", "app"),
    ]
}

fn agent_certificate(common_name: &str, with_unit: bool) -> String {
    let mut params = CertificateParams::default();
    params.distinguished_name = DistinguishedName::new();
    params.distinguished_name.push(DnType::CountryName, "US");
    params.distinguished_name.push(DnType::OrganizationName, "MongoDB");
    if with_unit {
        params
            .distinguished_name
            .push(DnType::OrganizationalUnitName, "ENG");
    }
    params.distinguished_name.push(DnType::CommonName, common_name);
    let key = KeyPair::generate().unwrap();
    params.self_signed(&key).unwrap().pem()
}

#[test]
fn scram_installs_agent_and_users() {
    let config = enable(
        &base_config(),
        &users(),
        &scram_options(vec![AuthMechanism::ScramSha256]),
    )
    .unwrap();
    let auth = &config.auth;
    assert!(!auth.disabled);
    assert!(auth.authoritative_set);
    assert_eq!(auth.auto_user, AGENT_NAME);
    assert_eq!(auth.auto_auth_mechanism, "SCRAM-SHA-256");
    assert_eq!(auth.auto_auth_mechanisms, vec!["SCRAM-SHA-256"]);
    assert_eq!(auth.deployment_auth_mechanisms, vec!["SCRAM-SHA-256"]);
    assert_eq!(auth.auto_pwd, "agent-password");
    assert_eq!(
        auth.key_file,
        "/var/lib/mongodb-mms-automation/authentication/keyfile"
    );
    assert_eq!(auth.key.len(), 500);

    assert_eq!(auth.users.len(), 1);
    let admin = auth.user("admin", "admin").unwrap();
    assert_eq!(admin.roles[0].role, "root");
    assert!(admin.scram_sha256_creds.is_some());
    assert!(admin.scram_sha1_creds.is_none());
}

#[test]
fn both_scram_variants_run_one_pass() {
    let config = enable(
        &base_config(),
        &users(),
        &scram_options(vec![AuthMechanism::ScramSha256, AuthMechanism::ScramSha1]),
    )
    .unwrap();
    assert_eq!(
        config.auth.deployment_auth_mechanisms,
        vec!["SCRAM-SHA-256", "MONGODB-CR"]
    );
    assert_eq!(
        config.auth.auto_auth_mechanisms,
        vec!["SCRAM-SHA-256", "MONGODB-CR"]
    );
    let admin = config.auth.user("admin", "admin").unwrap();
    assert_eq!(admin.scram_sha1_creds.as_ref().unwrap().iteration_count, 10_000);
    assert_eq!(admin.scram_sha256_creds.as_ref().unwrap().iteration_count, 15_000);
}

#[test]
fn enabling_twice_changes_nothing() {
    let options = scram_options(vec![AuthMechanism::ScramSha256, AuthMechanism::ScramSha1]);
    let once = enable(&base_config(), &users(), &options).unwrap();
    let twice = enable(&once, &users(), &options).unwrap();
    assert_eq!(
        twice.auth.deployment_auth_mechanisms.len(),
        once.auth.deployment_auth_mechanisms.len()
    );
    assert_eq!(twice.auth.users.len(), once.auth.users.len());
    assert_eq!(twice, once);
}

#[test]
fn repeated_mechanisms_are_recorded_once() {
    let options = scram_options(vec![
        AuthMechanism::ScramSha256,
        AuthMechanism::ScramSha256,
    ]);
    let config = enable(&base_config(), &users(), &options).unwrap();
    assert_eq!(config.auth.deployment_auth_mechanisms, vec!["SCRAM-SHA-256"]);
}

#[test]
fn removed_users_are_scheduled_for_deletion() {
    let options = scram_options(vec![AuthMechanism::ScramSha256]);
    let mut all_users = users();
    all_users.push(UserSpec::new("reporting", "admin").with_password("secret"));
    let before = enable(&base_config(), &all_users, &options).unwrap();
    assert_eq!(before.auth.users.len(), 2);

    let after = enable(&before, &users(), &options).unwrap();
    assert_eq!(after.auth.users.len(), 1);
    assert_eq!(after.auth.users_deleted.len(), 1);
    assert_eq!(after.auth.users_deleted[0].user, "reporting");
    assert_eq!(after.auth.users_deleted[0].dbs, vec!["admin"]);

    let restored = enable(&after, &all_users, &options).unwrap();
    assert!(restored.auth.users_deleted.is_empty());
}

#[test]
fn failures_leave_input_untouched() {
    let config = base_config();
    let mut options = scram_options(vec![AuthMechanism::ScramSha256, AuthMechanism::X509]);
    options.agent_mechanism = AuthMechanism::X509;
    options.agent_certificate_pem = Some("INVALID CERT".to_string());
    let err = enable(&config, &users(), &options).unwrap_err();
    assert!(matches!(err, AuthError::CertificateParse { .. }));
    assert!(config.auth.disabled);
    assert!(config.auth.users.is_empty());
}

#[test]
fn validates_agent_settings() {
    let mut options = scram_options(vec![AuthMechanism::ScramSha256]);
    options.agent_password.clear();
    assert_eq!(
        enable(&base_config(), &users(), &options).unwrap_err(),
        AuthError::MissingAgentPassword
    );

    let mut options = scram_options(vec![AuthMechanism::ScramSha256]);
    options.keyfile_contents = "short".to_string();
    assert_eq!(
        enable(&base_config(), &users(), &options).unwrap_err(),
        AuthError::InvalidKeyfile { length: 5 }
    );

    let options = scram_options(Vec::new());
    assert_eq!(
        enable(&base_config(), &users(), &options).unwrap_err(),
        AuthError::NoMechanisms
    );

    let mut options = scram_options(vec![AuthMechanism::ScramSha256]);
    options.agent_mechanism = AuthMechanism::X509;
    assert_eq!(
        enable(&base_config(), &users(), &options).unwrap_err(),
        AuthError::AgentMechanismNotEnabled {
            mechanism: AuthMechanism::X509
        }
    );
}

#[test]
fn certificate_subject_becomes_agent_principal() {
    let mut options = AuthOptions::new("my-rs", vec![AuthMechanism::X509]);
    options.keyfile_contents = generate_keyfile_contents();
    options.agent_certificate_pem = Some(agent_certificate("mms-automation-agent", true));
    let config = enable(&base_config(), &users(), &options).unwrap();
    let auth = &config.auth;
    assert_eq!(auth.auto_user, "CN=mms-automation-agent,OU=ENG,O=MongoDB,C=US");
    assert_eq!(auth.auto_auth_mechanism, "MONGODB-X509");
    assert_eq!(auth.auto_auth_mechanisms, vec!["MONGODB-X509"]);
    assert_eq!(auth.deployment_auth_mechanisms, vec!["MONGODB-X509"]);
    assert!(auth.auto_pwd.is_empty());

    assert_eq!(auth.users.len(), 1);
    let user = &auth.users[0];
    assert_eq!(user.database, "$external");
    assert_eq!(user.username, "CN=app,OU=ENG,O=MongoDB,C=US");
    assert!(user.scram_sha1_creds.is_none());
    assert!(user.scram_sha256_creds.is_none());
}

#[test]
fn subject_without_unit_is_rejected() {
    let mut options = AuthOptions::new("my-rs", vec![AuthMechanism::X509]);
    options.keyfile_contents = generate_keyfile_contents();
    options.agent_certificate_pem = Some(agent_certificate("agent", false));
    let err = enable(&base_config(), &users(), &options).unwrap_err();
    assert_eq!(
        err,
        AuthError::InvalidSubject {
            subject: "CN=agent,O=MongoDB,C=US".to_string()
        }
    );
}

#[test]
fn mixed_mechanisms_keep_both_user_kinds() {
    let mut options = scram_options(vec![AuthMechanism::ScramSha256, AuthMechanism::X509]);
    options.agent_mechanism = AuthMechanism::ScramSha256;
    let config = enable(&base_config(), &users(), &options).unwrap();
    assert_eq!(
        config.auth.deployment_auth_mechanisms,
        vec!["SCRAM-SHA-256", "MONGODB-X509"]
    );
    assert_eq!(config.auth.auto_user, AGENT_NAME);
    assert_eq!(config.auth.users.len(), 2);
}

#[test]
fn subject_helpers() {
    let pem = agent_certificate("escaped, name", true);
    assert_eq!(
        subject_from_pem(&pem).unwrap(),
        "CN=escaped\\, name,OU=ENG,O=MongoDB,C=US"
    );
    assert!(is_valid_subject("CN=a,OU=b,C=US"));
    assert!(!is_valid_subject("CN=a,C=US"));
    assert!(!is_valid_subject("CN=,OU=b,C=US"));
}

#[test]
fn attributes_without_short_names_render_as_encoded_values() {
    let mut params = CertificateParams::default();
    params.distinguished_name = DistinguishedName::new();
    params.distinguished_name.push(DnType::CountryName, "US");
    params
        .distinguished_name
        .push(DnType::OrganizationalUnitName, "ENG");
    params.distinguished_name.push(DnType::CommonName, "agent");
    params.distinguished_name.push(
        DnType::CustomDnType(vec![1, 2, 840, 113549, 1, 9, 1]),
        DnValue::Ia5String("a@b.io".try_into().unwrap()),
    );
    let key = KeyPair::generate().unwrap();
    let pem = params.self_signed(&key).unwrap().pem();

    let subject = subject_from_pem(&pem).unwrap();
    assert_eq!(
        subject,
        "1.2.840.113549.1.9.1=#16066140622e696f,CN=agent,OU=ENG,C=US"
    );
    assert!(is_valid_subject(&subject));
}

#[test]
fn domain_components_render_as_encoded_values() {
    let mut params = CertificateParams::default();
    params.distinguished_name = DistinguishedName::new();
    params.distinguished_name.push(
        DnType::CustomDnType(vec![0, 9, 2342, 19200300, 100, 1, 25]),
        DnValue::Ia5String("io".try_into().unwrap()),
    );
    params.distinguished_name.push(DnType::CommonName, "agent");
    let key = KeyPair::generate().unwrap();
    let pem = params.self_signed(&key).unwrap().pem();

    assert_eq!(
        subject_from_pem(&pem).unwrap(),
        "CN=agent,0.9.2342.19200300.100.1.25=#1602696f"
    );
}

#[test]
fn mechanism_names() {
    assert_eq!("SCRAM".parse::<AuthMechanism>().unwrap(), AuthMechanism::ScramSha256);
    assert_eq!("SCRAM-SHA-1".parse::<AuthMechanism>().unwrap(), AuthMechanism::ScramSha1);
    assert_eq!("X509".parse::<AuthMechanism>().unwrap(), AuthMechanism::X509);
    assert_eq!(AuthMechanism::ScramSha1.automation_name(), "MONGODB-CR");
    assert_eq!(
        "PLAIN".parse::<AuthMechanism>().unwrap_err(),
        AuthError::UnsupportedMechanism {
            name: "PLAIN".to_string()
        }
    );
}

#[test]
fn disabling_restores_default_block() {
    let enabled = enable(
        &base_config(),
        &users(),
        &scram_options(vec![AuthMechanism::ScramSha256]),
    )
    .unwrap();
    let disabled = disable(&enabled);
    assert!(disabled.auth.disabled);
    assert_eq!(disabled.auth.auto_auth_mechanism, "MONGODB-CR");
    assert!(disabled.auth.users.is_empty());
    assert_eq!(disabled.processes, enabled.processes);
}
