//! Certificate utilities
//!
//! Parses an X.509 certificate out of a PEM file and exposes the fields the
//! rest of the core needs: subject/issuer names, SANs, and the validity
//! window. Certificates are immutable views — nothing here mutates a
//! loaded certificate.

use openssl::asn1::Asn1TimeRef;
use openssl::nid::Nid;
use openssl::stack::Stack;
use openssl::x509::{GeneralName, X509NameRef, X509};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::common::fs::read_file;
use crate::common::{CoreError, Result};

/// Issuer subset of the certificate's distinguished name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Issuer {
    pub cn: String,
    pub organization: String,
}

/// Immutable view of a parsed X.509 certificate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Certificate {
    pub cn: String,
    pub valid_from: String,
    pub valid_to: String,
    pub dns_names: Vec<String>,
    pub email_addresses: Vec<String>,
    pub organization: String,
    pub province: String,
    pub country: String,
    pub locality: String,
    pub is_ca: bool,
    pub is_valid: bool,
    pub issuer: Issuer,
    pub serial_number: String,
    pub signature_algorithm: String,
}

fn name_entry(name: &X509NameRef, nid: Nid) -> String {
    name.entries_by_nid(nid)
        .next()
        .and_then(|e| e.data().as_utf8().ok())
        .map(|s| s.to_string())
        .unwrap_or_default()
}

fn asn1_time_to_rfc3339(time: &Asn1TimeRef) -> Result<String> {
    // openssl's Asn1Time does not expose a direct chrono conversion; its
    // Display impl renders RFC 822-ish text ("Jan  1 00:00:00 2030 GMT")
    // which we reparse into RFC3339 via chrono.
    let text = time.to_string();
    let parsed = chrono::NaiveDateTime::parse_from_str(&text, "%b %e %T %Y %Z")
        .map_err(|e| CoreError::config_parse(format!("unparseable time '{}': {}", text, e)))?;
    Ok(chrono::DateTime::<chrono::Utc>::from_naive_utc_and_offset(parsed, chrono::Utc).to_rfc3339())
}

fn collect_san_dns_and_emails(cert: &X509) -> (Vec<String>, Vec<String>) {
    let mut dns_names = Vec::new();
    let mut emails = Vec::new();

    if let Some(names) = cert.subject_alt_names() {
        let names: Stack<GeneralName> = names;
        for name in names.iter() {
            if let Some(dns) = name.dnsname() {
                dns_names.push(dns.to_string());
            } else if let Some(email) = name.email() {
                emails.push(email.to_string());
            }
        }
    }

    (dns_names, emails)
}

/// Parse a PEM certificate file into a `Certificate` view.
pub fn parse_certificate(cert_path: &Path) -> Result<Certificate> {
    let data = read_file(cert_path)?;
    let cert = X509::from_pem(&data)
        .map_err(|e| CoreError::config_parse(format!("failed to parse certificate: {}", e)))?;

    let subject = cert.subject_name();
    let issuer_name = cert.issuer_name();

    let (mut dns_names, email_addresses) = collect_san_dns_and_emails(&cert);
    let cn = name_entry(subject, Nid::COMMONNAME);
    if dns_names.is_empty() && !cn.is_empty() {
        dns_names.push(cn.clone());
    }

    let valid_from = asn1_time_to_rfc3339(cert.not_before())?;
    let valid_to = asn1_time_to_rfc3339(cert.not_after())?;

    let now_valid = {
        let now = openssl::asn1::Asn1Time::days_from_now(0)
            .map_err(|e| CoreError::config_parse(e.to_string()))?;
        cert.not_before() <= now.as_ref() && now.as_ref() <= cert.not_after()
    };

    let is_ca = cert
        .basic_constraints()
        .map(|bc| bc.ca)
        .unwrap_or(false);

    let serial_number = cert
        .serial_number()
        .to_bn()
        .map_err(|e| CoreError::config_parse(e.to_string()))?
        .to_dec_str()
        .map_err(|e| CoreError::config_parse(e.to_string()))?
        .to_string();

    let signature_algorithm = cert.signature_algorithm().object().to_string();

    Ok(Certificate {
        cn,
        valid_from,
        valid_to,
        dns_names,
        email_addresses,
        organization: name_entry(subject, Nid::ORGANIZATIONNAME),
        province: name_entry(subject, Nid::STATEORPROVINCENAME),
        country: name_entry(subject, Nid::COUNTRYNAME),
        locality: name_entry(subject, Nid::LOCALITYNAME),
        is_ca,
        is_valid: now_valid,
        issuer: Issuer {
            cn: name_entry(issuer_name, Nid::COMMONNAME),
            organization: name_entry(issuer_name, Nid::ORGANIZATIONNAME),
        },
        serial_number,
        signature_algorithm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Integration-level tests live in tests/certificate_test.rs where a
    // self-signed fixture certificate is generated with openssl at test
    // setup time; this module only covers pure helpers.

    #[test]
    fn name_entry_on_empty_name_is_empty_string() {
        let builder = openssl::x509::X509NameBuilder::new().unwrap();
        let name = builder.build();
        assert_eq!(name_entry(&name, Nid::COMMONNAME), "");
    }
}
