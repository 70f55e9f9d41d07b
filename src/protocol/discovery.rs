//! `GET info/refs?service=git-upload-pack` and its ref advertisement

use std::collections::BTreeMap;

use super::http::HttpClient;
use super::pkt_line::{self, PktLine};
use crate::error::{Error, Result};
use crate::object::ObjectId;

pub const UPLOAD_PACK_SERVICE: &str = "git-upload-pack";

/// Capability list from the first advertised ref line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities(Vec<String>);

impl Capabilities {
    pub fn parse(raw: &str) -> Self {
        Self(raw.split_whitespace().map(str::to_string).collect())
    }

    /// True for `name` itself or any `name=value`
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|cap| {
            cap == name
                || cap
                    .strip_prefix(name)
                    .is_some_and(|rest| rest.starts_with('='))
        })
    }

    /// Every value of `name=value` capabilities (symref may repeat)
    pub fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0.iter().filter_map(move |cap| {
            cap.strip_prefix(name)
                .and_then(|rest| rest.strip_prefix('='))
        })
    }

    /// Target of `symref=<from>:<to>`
    pub fn symref(&self, from: &str) -> Option<&str> {
        self.values("symref").find_map(|value| {
            let (src, dst) = value.split_once(':')?;
            (src == from).then_some(dst)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Refs and capabilities advertised by the server
#[derive(Debug, Clone, Default)]
pub struct RefAdvertisement {
    pub refs: BTreeMap<String, ObjectId>,
    pub capabilities: Capabilities,
}

impl RefAdvertisement {
    /// `(branch name, tip)` for every `refs/heads/*`
    pub fn branches(&self) -> impl Iterator<Item = (&str, &ObjectId)> {
        self.refs
            .iter()
            .filter_map(|(name, id)| Some((name.strip_prefix("refs/heads/")?, id)))
    }

    /// Branch HEAD should point at after a clone
    pub fn default_branch(&self) -> Option<String> {
        if let Some(target) = self.capabilities.symref("HEAD") {
            if let Some(branch) = target.strip_prefix("refs/heads/") {
                if self.refs.contains_key(target) {
                    return Some(branch.to_string());
                }
            }
        }

        let branches: Vec<_> = self.branches().collect();
        if let Some(head) = self.refs.get("HEAD") {
            let matching: Vec<&str> = branches
                .iter()
                .filter(|(_, id)| *id == head)
                .map(|(name, _)| *name)
                .collect();
            for preferred in ["main", "master"] {
                if matching.contains(&preferred) {
                    return Some(preferred.to_string());
                }
            }
            if let Some(first) = matching.first() {
                return Some(first.to_string());
            }
        }

        branches.first().map(|(name, _)| name.to_string())
    }
}

/// Parse an advertisement body. A leading `# service=git-upload-pack`
/// line and its flush are consumed when present.
pub fn parse_advertisement(body: &[u8]) -> Result<RefAdvertisement> {
    parse_body(body).map(|(advertisement, _)| advertisement)
}

fn parse_body(body: &[u8]) -> Result<(RefAdvertisement, bool)> {
    if body.is_empty() {
        return Err(Error::protocol("empty ref advertisement"));
    }

    let mut pos = 0;
    let mut saw_service_header = false;

    let (first, after_first) = pkt_line::read(body, pos)?;
    if let PktLine::Data(payload) = first {
        if let Some(service) = pkt_line::trim_lf(payload).strip_prefix(b"# service=") {
            if service != UPLOAD_PACK_SERVICE.as_bytes() {
                return Err(Error::protocol(format!(
                    "unexpected service {:?}",
                    String::from_utf8_lossy(service)
                )));
            }
            match pkt_line::read(body, after_first)? {
                (PktLine::Flush, next) => pos = next,
                _ => return Err(Error::protocol("service header not followed by flush")),
            }
            saw_service_header = true;
        }
    }

    let mut advertisement = RefAdvertisement::default();
    let mut first_ref = true;
    loop {
        let (line, next) = pkt_line::read(body, pos)?;
        pos = next;
        let payload = match line {
            PktLine::Data(payload) => pkt_line::trim_lf(payload),
            PktLine::Flush => break,
            other => {
                return Err(Error::protocol(format!(
                    "unexpected {:?} in ref advertisement",
                    other
                )))
            }
        };

        let (ref_part, caps) = match payload.iter().position(|&b| b == 0) {
            Some(nul) => (&payload[..nul], Some(&payload[nul + 1..])),
            None => (payload, None),
        };
        if first_ref {
            if let Some(caps) = caps {
                advertisement.capabilities = Capabilities::parse(&String::from_utf8_lossy(caps));
            }
            first_ref = false;
        }

        let (id, name) = parse_ref_line(ref_part)?;
        // Empty repositories advertise capabilities on a placeholder line
        if name == "capabilities^{}" && id.is_null() {
            continue;
        }
        // Peeled tag targets are not refs of their own
        if name.ends_with("^{}") {
            continue;
        }
        advertisement.refs.insert(name, id);
    }

    if pos != body.len() {
        return Err(Error::protocol(format!(
            "{} unexpected bytes after ref advertisement",
            body.len() - pos
        )));
    }

    Ok((advertisement, saw_service_header))
}

fn parse_ref_line(line: &[u8]) -> Result<(ObjectId, String)> {
    let text = std::str::from_utf8(line)
        .map_err(|_| Error::protocol("ref line is not UTF-8"))?;
    let (hex, name) = text
        .split_once(' ')
        .ok_or_else(|| Error::protocol(format!("malformed ref line: {:?}", text)))?;
    let id = ObjectId::from_hex(hex)
        .map_err(|_| Error::protocol(format!("malformed object id in ref line: {:?}", text)))?;
    if name.is_empty() {
        return Err(Error::protocol(format!("ref line has no name: {:?}", text)));
    }
    Ok((id, name.to_string()))
}

/// Fetch and parse the advertisement of the repository at `url`
pub async fn discover(client: &dyn HttpClient, url: &str) -> Result<RefAdvertisement> {
    let info_refs = format!(
        "{}/info/refs?service={}",
        url.trim_end_matches('/'),
        UPLOAD_PACK_SERVICE
    );
    let response = client.get(&info_refs).await?;
    if !response.is_success() {
        return Err(Error::protocol(format!(
            "GET {} failed with HTTP {}",
            info_refs, response.status
        )));
    }

    let (advertisement, saw_service_header) = parse_body(&response.body)?;
    if !saw_service_header {
        return Err(Error::protocol(format!(
            "{} is not a smart-HTTP server: missing service header",
            url
        )));
    }

    tracing::info!(
        "discovered {} refs at {} ({} capabilities)",
        advertisement.refs.len(),
        url,
        advertisement.capabilities.iter().count()
    );
    Ok(advertisement)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID_A: &str = "1111111111111111111111111111111111111111";
    const ID_B: &str = "2222222222222222222222222222222222222222";

    fn pkt(payload: &str) -> Vec<u8> {
        pkt_line::encode(payload.as_bytes()).unwrap()
    }

    fn advertisement(lines: &[&str]) -> Vec<u8> {
        let mut body = pkt("# service=git-upload-pack\n");
        body.extend_from_slice(pkt_line::FLUSH);
        for line in lines {
            body.extend(pkt(line));
        }
        body.extend_from_slice(pkt_line::FLUSH);
        body
    }

    #[test]
    fn test_single_head_without_service_header() {
        let mut body = format!("0036{} HEAD\0cap\n", ID_A).into_bytes();
        body.extend_from_slice(b"0000");

        let adv = parse_advertisement(&body).unwrap();
        assert_eq!(adv.refs.len(), 1);
        assert_eq!(adv.refs["HEAD"].to_hex(), ID_A);
        assert!(adv.capabilities.contains("cap"));
    }

    #[test]
    fn test_branches_and_capabilities() {
        let body = advertisement(&[
            &format!(
                "{} HEAD\0multi_ack side-band-64k ofs-delta symref=HEAD:refs/heads/main agent=git/2.43\n",
                ID_A
            ),
            &format!("{} refs/heads/main\n", ID_A),
            &format!("{} refs/heads/topic\n", ID_B),
            &format!("{} refs/tags/v1\n", ID_B),
            &format!("{} refs/tags/v1^{{}}\n", ID_A),
        ]);

        let adv = parse_advertisement(&body).unwrap();
        assert_eq!(adv.refs.len(), 4);
        assert!(!adv.refs.contains_key("refs/tags/v1^{}"));
        let branches: Vec<_> = adv.branches().map(|(name, _)| name).collect();
        assert_eq!(branches, ["main", "topic"]);
        assert!(adv.capabilities.contains("side-band-64k"));
        assert!(adv.capabilities.contains("agent"));
        assert!(!adv.capabilities.contains("side-band"));
        assert_eq!(adv.capabilities.symref("HEAD"), Some("refs/heads/main"));
        assert_eq!(adv.default_branch().as_deref(), Some("main"));
    }

    #[test]
    fn test_default_branch_without_symref_matches_head() {
        let body = advertisement(&[
            &format!("{} HEAD\0ofs-delta\n", ID_B),
            &format!("{} refs/heads/alpha\n", ID_A),
            &format!("{} refs/heads/trunk\n", ID_B),
        ]);
        let adv = parse_advertisement(&body).unwrap();
        assert_eq!(adv.default_branch().as_deref(), Some("trunk"));
    }

    #[test]
    fn test_empty_repository() {
        let body = advertisement(&[&format!(
            "{} capabilities^{{}}\0ofs-delta\n",
            ObjectId::NULL
        )]);
        let adv = parse_advertisement(&body).unwrap();
        assert!(adv.refs.is_empty());
        assert!(adv.capabilities.contains("ofs-delta"));
        assert_eq!(adv.default_branch(), None);
    }

    #[test]
    fn test_length_mismatch_is_protocol_error() {
        let mut body = format!("0050{} HEAD\0cap\n", ID_A).into_bytes();
        body.extend_from_slice(b"0000");
        assert!(matches!(
            parse_advertisement(&body),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_undercounted_length_prefix_rejected() {
        // 0x32 stops the line short of its capabilities; the leftover
        // "cap\n" cannot be read as a length
        let mut body = format!("0032{} HEAD\0cap\n", ID_A).into_bytes();
        body.extend_from_slice(b"0000");
        assert!(matches!(
            parse_advertisement(&body),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_missing_terminating_flush() {
        let body = pkt(&format!("{} HEAD\0cap\n", ID_A));
        assert!(matches!(
            parse_advertisement(&body),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_wrong_service_rejected() {
        let mut body = pkt("# service=git-receive-pack\n");
        body.extend_from_slice(pkt_line::FLUSH);
        body.extend_from_slice(pkt_line::FLUSH);
        assert!(parse_advertisement(&body).is_err());
    }
}
