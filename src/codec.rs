use crate::error::ParseError;
use http::header::{self, HeaderMap, HeaderValue};
use std::fmt;

/// Qvalue assigned to a coding that carries no explicit `q` parameter.
pub const DEFAULT_QVALUE: f32 = 1.0;

/// Content-codings understood by the middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Coding {
    /// No transformation.
    Identity,
    /// Raw deflate stream (RFC 1951).
    Deflate,
    /// Gzip file format (RFC 1952).
    Gzip,
}

impl Coding {
    /// Returns the registered content-coding name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Coding::Identity => "identity",
            Coding::Deflate => "deflate",
            Coding::Gzip => "gzip",
        }
    }

    /// Returns the Content-Encoding header value for this coding.
    pub fn header_value(&self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }

    /// Looks up a coding by its lower-case name.
    pub fn from_name(name: &str) -> Option<Coding> {
        match name {
            "identity" => Some(Coding::Identity),
            "deflate" => Some(Coding::Deflate),
            "gzip" => Some(Coding::Gzip),
            _ => None,
        }
    }

    /// Parses the Accept-Encoding header and selects a coding with `policy`.
    ///
    /// The header value is expected to be comma-separated codings with optional
    /// quality values (e.g., "gzip;q=1.0, identity; q=0.5, *;q=0").
    pub fn from_accept_encoding(header: &str, policy: SelectionPolicy) -> Coding {
        policy.select(&parse_quality_list(header))
    }

    /// Selects a coding from every `Accept-Encoding` field in `headers`.
    ///
    /// Multiple fields are treated as one comma-separated list. Values that
    /// aren't visible ASCII are ignored.
    pub fn from_headers(headers: &HeaderMap, policy: SelectionPolicy) -> Coding {
        let fields: Vec<&str> = headers
            .get_all(header::ACCEPT_ENCODING)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();

        Self::from_accept_encoding(&fields.join(","), policy)
    }
}

impl fmt::Display for Coding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a [`QualityList`] is turned into a single [`Coding`].
///
/// Both policies agree on every input except one that explicitly accepts
/// `identity` alongside a compressed coding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Ignore `identity`; pick gzip, then deflate, then fall back to identity.
    ///
    /// `identity;q=0.5, gzip` compresses with gzip.
    #[default]
    PreferCompressed,
    /// Honour an explicitly accepted `identity` before gzip and deflate.
    ///
    /// `identity;q=0.5, gzip` is not compressed. An absent `identity`
    /// counts as weight 0 here, so `gzip` alone still compresses.
    IdentityFirst,
}

impl SelectionPolicy {
    /// Returns the first coding in this policy's priority order whose weight
    /// is greater than zero, or identity when none is.
    pub fn select(self, list: &QualityList) -> Coding {
        let order: &[Coding] = match self {
            SelectionPolicy::PreferCompressed => &[Coding::Gzip, Coding::Deflate],
            SelectionPolicy::IdentityFirst => &[Coding::Identity, Coding::Gzip, Coding::Deflate],
        };

        order
            .iter()
            .copied()
            .find(|&coding| list.weight(coding) > 0.0)
            .unwrap_or(Coding::Identity)
    }
}

/// Weights of the codings named by an `Accept-Encoding` header.
///
/// Only `identity`, `gzip` and `deflate` are retained; every weight lies in
/// `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QualityList {
    identity: Option<f32>,
    deflate: Option<f32>,
    gzip: Option<f32>,
}

impl QualityList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the weight given to `coding`, if the header named it.
    pub fn get(&self, coding: Coding) -> Option<f32> {
        *self.slot(coding)
    }

    /// Returns the weight given to `coding`, treating an absent coding as 0.
    pub fn weight(&self, coding: Coding) -> f32 {
        self.get(coding).unwrap_or(0.0)
    }

    /// Sets the weight for `coding`, clamped to `[0.0, 1.0]`.
    pub fn insert(&mut self, coding: Coding, quality: f32) {
        *self.slot_mut(coding) = Some(clamp_quality(quality));
    }

    /// Returns `true` if no supported coding was named.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of supported codings named.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Iterates over the named codings and their weights.
    pub fn iter(&self) -> impl Iterator<Item = (Coding, f32)> + '_ {
        [Coding::Identity, Coding::Deflate, Coding::Gzip]
            .into_iter()
            .filter_map(|coding| self.get(coding).map(|q| (coding, q)))
    }

    fn slot(&self, coding: Coding) -> &Option<f32> {
        match coding {
            Coding::Identity => &self.identity,
            Coding::Deflate => &self.deflate,
            Coding::Gzip => &self.gzip,
        }
    }

    fn slot_mut(&mut self, coding: Coding) -> &mut Option<f32> {
        match coding {
            Coding::Identity => &mut self.identity,
            Coding::Deflate => &mut self.deflate,
            Coding::Gzip => &mut self.gzip,
        }
    }
}

impl FromIterator<(Coding, f32)> for QualityList {
    fn from_iter<I: IntoIterator<Item = (Coding, f32)>>(iter: I) -> Self {
        let mut list = QualityList::new();
        for (coding, quality) in iter {
            list.insert(coding, quality);
        }
        list
    }
}

impl<const N: usize> From<[(Coding, f32); N]> for QualityList {
    fn from(entries: [(Coding, f32); N]) -> Self {
        entries.into_iter().collect()
    }
}

/// The result of parsing an `Accept-Encoding` header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcceptEncoding {
    /// Weights of the supported codings.
    pub codings: QualityList,
    /// Malformed tokens encountered along the way.
    pub errors: Vec<ParseError>,
}

/// Parses an `Accept-Encoding` header, per RFC 2616 section 14.3.
///
/// Malformed tokens never abort the parse; they're collected in
/// [`AcceptEncoding::errors`] for diagnostics.
pub fn parse_accept_encoding(header: &str) -> AcceptEncoding {
    let mut parsed = AcceptEncoding::default();
    if header.trim().is_empty() {
        return parsed;
    }

    for token in header.split(',') {
        let Some((name, quality)) = parse_coding(token, &mut parsed.errors) else {
            continue;
        };
        // Unknown codings and the `*` wildcard don't influence selection.
        if let Some(coding) = Coding::from_name(&name) {
            parsed.codings.insert(coding, quality);
        }
    }

    for error in &parsed.errors {
        tracing::trace!(%error, "ignoring malformed accept-encoding token");
    }

    parsed
}

/// Parses an `Accept-Encoding` header into coding weights, discarding errors.
pub fn parse_quality_list(header: &str) -> QualityList {
    parse_accept_encoding(header).codings
}

/// Parses one `coding[;q=value]` token into a lower-case name and weight.
///
/// Returns `None` for a token without a name. A `q` value that doesn't parse
/// leaves the weight at [`DEFAULT_QVALUE`].
pub(crate) fn parse_coding(token: &str, errors: &mut Vec<ParseError>) -> Option<(String, f32)> {
    let mut segments = token.split(';');
    let name = segments.next().unwrap_or("").trim().to_ascii_lowercase();
    if name.is_empty() {
        errors.push(ParseError::EmptyCoding(token.to_owned()));
        return None;
    }

    let mut quality = DEFAULT_QVALUE;
    for segment in segments {
        let Some((key, value)) = segment.split_once('=') else {
            continue;
        };
        if !key.trim().eq_ignore_ascii_case("q") {
            continue;
        }

        let value = value.trim();
        match value.parse::<f32>() {
            Ok(q) if !q.is_nan() => quality = clamp_quality(q),
            _ => errors.push(ParseError::InvalidQuality {
                coding: name.clone(),
                value: value.to_owned(),
            }),
        }
    }

    Some((name, quality))
}

fn clamp_quality(q: f32) -> f32 {
    if q.is_nan() { DEFAULT_QVALUE } else { q.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_str() {
        assert_eq!(Coding::Identity.as_str(), "identity");
        assert_eq!(Coding::Deflate.as_str(), "deflate");
        assert_eq!(Coding::Gzip.as_str(), "gzip");
        assert_eq!(Coding::Gzip.header_value(), "gzip");
    }

    #[test]
    fn test_parse_rfc_examples() {
        assert_eq!(
            parse_quality_list("compress, gzip"),
            QualityList::from([(Coding::Gzip, 1.0)])
        );
        assert_eq!(parse_quality_list(""), QualityList::new());
        assert_eq!(parse_quality_list("*"), QualityList::new());
        assert_eq!(
            parse_quality_list("compress;q=0.5, gzip;q=1.0"),
            QualityList::from([(Coding::Gzip, 1.0)])
        );
        assert_eq!(
            parse_quality_list("gzip;q=1.0, identity; q=0.5, *;q=0"),
            QualityList::from([(Coding::Gzip, 1.0), (Coding::Identity, 0.5)])
        );
    }

    #[test]
    fn test_parse_unknown_codings_dropped() {
        assert_eq!(parse_quality_list("AAA;q=1"), QualityList::new());
        assert_eq!(parse_quality_list("BBB ; q = 2"), QualityList::new());
        assert_eq!(
            parse_quality_list("gzip, deflate, sdch"),
            QualityList::from([(Coding::Gzip, 1.0), (Coding::Deflate, 1.0)])
        );
    }

    #[test]
    fn test_parse_case_and_whitespace() {
        let list = parse_quality_list("  GZip ;  Q = 0.3 ,DEFLATE");
        assert_eq!(list.get(Coding::Gzip), Some(0.3));
        assert_eq!(list.get(Coding::Deflate), Some(1.0));
    }

    #[test]
    fn test_parse_clamps_quality() {
        let list = parse_quality_list("gzip;q=2, deflate;q=-1, identity;q=inf");
        assert_eq!(list.get(Coding::Gzip), Some(1.0));
        assert_eq!(list.get(Coding::Deflate), Some(0.0));
        assert_eq!(list.get(Coding::Identity), Some(1.0));
    }

    #[test]
    fn test_parse_weights_always_in_range() {
        let headers = [
            "gzip;q=1e9",
            "deflate;q=-1e9",
            "gzip;q=0.0001, deflate;q=0.9999",
            "gzip;q=-0, identity;q=+0.5",
            "gzip;q=NaN",
            ";;;,,,gzip;;q=;q==",
        ];
        for header in headers {
            for (coding, q) in parse_quality_list(header).iter() {
                assert!((0.0..=1.0).contains(&q), "{header}: {coding} = {q}");
            }
        }
    }

    #[test]
    fn test_parse_invalid_quality_keeps_default() {
        let parsed = parse_accept_encoding("gzip;q=abc, deflate;q=NaN");
        assert_eq!(parsed.codings.get(Coding::Gzip), Some(DEFAULT_QVALUE));
        assert_eq!(parsed.codings.get(Coding::Deflate), Some(DEFAULT_QVALUE));
        assert_eq!(
            parsed.errors,
            vec![
                ParseError::InvalidQuality {
                    coding: "gzip".to_owned(),
                    value: "abc".to_owned(),
                },
                ParseError::InvalidQuality {
                    coding: "deflate".to_owned(),
                    value: "NaN".to_owned(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_empty_token_rejected() {
        let parsed = parse_accept_encoding("gzip, ;q=0.5, deflate");
        assert_eq!(
            parsed.codings,
            QualityList::from([(Coding::Gzip, 1.0), (Coding::Deflate, 1.0)])
        );
        assert_eq!(
            parsed.errors,
            vec![ParseError::EmptyCoding(" ;q=0.5".to_owned())]
        );
    }

    #[test]
    fn test_parse_blank_header_has_no_errors() {
        let parsed = parse_accept_encoding("   ");
        assert!(parsed.codings.is_empty());
        assert!(parsed.errors.is_empty());
    }

    #[test]
    fn test_parse_last_occurrence_wins() {
        let list = parse_quality_list("gzip;q=0.2, gzip;q=0.7");
        assert_eq!(list.get(Coding::Gzip), Some(0.7));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_parse_ignores_other_parameters() {
        let list = parse_quality_list("gzip;level=9;q=0.4");
        assert_eq!(list.get(Coding::Gzip), Some(0.4));
    }

    #[test]
    fn test_parse_coding_token() {
        let mut errors = Vec::new();
        assert_eq!(
            parse_coding(" gzip ; q=0.8 ", &mut errors),
            Some(("gzip".to_owned(), 0.8))
        );
        assert_eq!(parse_coding("   ", &mut errors), None);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_select_prefers_gzip() {
        let policy = SelectionPolicy::PreferCompressed;
        assert_eq!(Coding::from_accept_encoding("gzip", policy), Coding::Gzip);
        assert_eq!(Coding::from_accept_encoding("deflate", policy), Coding::Deflate);
        assert_eq!(
            Coding::from_accept_encoding("deflate, gzip;q=0.1", policy),
            Coding::Gzip
        );
        assert_eq!(
            Coding::from_accept_encoding("gzip;q=0, deflate", policy),
            Coding::Deflate
        );
    }

    #[test]
    fn test_select_identity_fallback() {
        for policy in [SelectionPolicy::PreferCompressed, SelectionPolicy::IdentityFirst] {
            assert_eq!(Coding::from_accept_encoding("", policy), Coding::Identity);
            assert_eq!(Coding::from_accept_encoding("*", policy), Coding::Identity);
            assert_eq!(Coding::from_accept_encoding("br, zstd", policy), Coding::Identity);
            assert_eq!(
                Coding::from_accept_encoding("gzip;q=0, deflate;q=0", policy),
                Coding::Identity
            );
        }
    }

    #[test]
    fn test_select_policies_diverge_on_identity() {
        let header = "identity;q=0.5, gzip";
        assert_eq!(
            Coding::from_accept_encoding(header, SelectionPolicy::PreferCompressed),
            Coding::Gzip
        );
        assert_eq!(
            Coding::from_accept_encoding(header, SelectionPolicy::IdentityFirst),
            Coding::Identity
        );

        // Refusing identity explicitly doesn't matter to either policy.
        let header = "identity;q=0, gzip";
        assert_eq!(
            Coding::from_accept_encoding(header, SelectionPolicy::PreferCompressed),
            Coding::Gzip
        );
        assert_eq!(
            Coding::from_accept_encoding(header, SelectionPolicy::IdentityFirst),
            Coding::Gzip
        );
    }

    #[test]
    fn test_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(
            Coding::from_headers(&headers, SelectionPolicy::default()),
            Coding::Identity
        );

        headers.append(header::ACCEPT_ENCODING, HeaderValue::from_static("br"));
        headers.append(header::ACCEPT_ENCODING, HeaderValue::from_static("deflate"));
        assert_eq!(
            Coding::from_headers(&headers, SelectionPolicy::default()),
            Coding::Deflate
        );
    }
}
