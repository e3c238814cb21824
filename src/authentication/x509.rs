//! Certificate-subject principals.

use super::AuthError;
use x509_parser::der_parser::asn1_rs::Any;
use x509_parser::pem::parse_x509_pem;
use x509_parser::x509::{AttributeTypeAndValue, X509Name};

/// Attributes an agent subject must carry.
pub const REQUIRED_SUBJECT_ATTRIBUTES: &[&str] = &["CN", "C", "OU"];

/// Reads the subject of the first certificate in `pem` as an RFC 4514 string,
/// most specific attribute first (`CN=agent,OU=ENG,O=Org,C=US`).
pub fn subject_from_pem(pem: &str) -> Result<String, AuthError> {
    let (_, block) = parse_x509_pem(pem.as_bytes()).map_err(|err| AuthError::CertificateParse {
        reason: err.to_string(),
    })?;
    if block.label != "CERTIFICATE" {
        return Err(AuthError::CertificateParse {
            reason: format!("unexpected PEM block {}", block.label),
        });
    }
    let certificate = block
        .parse_x509()
        .map_err(|err| AuthError::CertificateParse {
            reason: err.to_string(),
        })?;
    Ok(format_subject(certificate.subject()))
}

/// True when every required attribute is present with a word-character value.
pub fn is_valid_subject(subject: &str) -> bool {
    REQUIRED_SUBJECT_ATTRIBUTES.iter().all(|name| {
        let needle = format!("{name}=");
        subject.match_indices(&needle).any(|(index, _)| {
            subject[index + needle.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
        })
    })
}

fn format_subject(name: &X509Name<'_>) -> String {
    let rdns: Vec<String> = name
        .iter_rdn()
        .map(|rdn| {
            rdn.iter()
                .map(format_attribute)
                .collect::<Vec<_>>()
                .join("+")
        })
        .collect();
    rdns.into_iter().rev().collect::<Vec<_>>().join(",")
}

fn format_attribute(attribute: &AttributeTypeAndValue<'_>) -> String {
    let oid = attribute.attr_type().to_id_string();
    match (short_name(&oid), attribute.as_str()) {
        (Some(label), Ok(value)) => format!("{label}={}", escape_value(value)),
        _ => format!("{oid}=#{}", hex::encode(der_encoding(attribute.attr_value()))),
    }
}

/// Tag, length and content octets of a parsed value.
fn der_encoding(value: &Any<'_>) -> Vec<u8> {
    let header = &value.header;
    let mut encoded = Vec::with_capacity(value.data.len() + 8);
    let mut identifier = (header.class() as u8) << 6;
    if header.is_constructed() {
        identifier |= 0x20;
    }
    let tag = header.tag().0;
    if tag < 0x1f {
        encoded.push(identifier | tag as u8);
    } else {
        encoded.push(identifier | 0x1f);
        encoded.extend(base128(tag));
    }
    let length = value.data.len();
    if length < 0x80 {
        encoded.push(length as u8);
    } else {
        let octets: Vec<u8> = length
            .to_be_bytes()
            .into_iter()
            .skip_while(|octet| *octet == 0)
            .collect();
        encoded.push(0x80 | octets.len() as u8);
        encoded.extend(octets);
    }
    encoded.extend_from_slice(value.data);
    encoded
}

fn base128(mut value: u32) -> Vec<u8> {
    let mut digits = vec![(value & 0x7f) as u8];
    value >>= 7;
    while value > 0 {
        digits.push(0x80 | (value & 0x7f) as u8);
        value >>= 7;
    }
    digits.reverse();
    digits
}

fn short_name(oid: &str) -> Option<&'static str> {
    Some(match oid {
        "2.5.4.3" => "CN",
        "2.5.4.5" => "SERIALNUMBER",
        "2.5.4.6" => "C",
        "2.5.4.7" => "L",
        "2.5.4.8" => "ST",
        "2.5.4.9" => "STREET",
        "2.5.4.10" => "O",
        "2.5.4.11" => "OU",
        "2.5.4.17" => "POSTALCODE",
        _ => return None,
    })
}

fn escape_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut escaped = String::with_capacity(value.len());
    for (index, c) in value.chars().enumerate() {
        let escape = match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' => true,
            ' ' => index == 0 || index == last,
            '#' => index == 0,
            _ => false,
        };
        if escape {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
