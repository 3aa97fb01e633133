use std::collections::BTreeMap;

use crate::codec::PayloadType;
use crate::direction::DirectionWay;
use crate::transform::{format_params, parse_params};

const RID_PARAM_PT: &str = "pt";

/// Restriction identifier of one simulcast encoding (`a=rid`).
///
/// ## Specifications
///
/// * [RFC 8851](https://datatracker.ietf.org/doc/html/rfc8851)
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RidInfo {
    pub id: String,
    pub direction: DirectionWay,
    pub formats: Vec<PayloadType>,
    pub params: BTreeMap<String, String>,
}

impl RidInfo {
    pub fn new(id: &str, direction: DirectionWay) -> Self {
        RidInfo {
            id: id.to_owned(),
            direction,
            ..Default::default()
        }
    }

    /// Parses the restriction part of `a=rid:<id> <dir> pt=96,97;max-width=1280`.
    pub(crate) fn parse_restrictions(&mut self, raw: &str) {
        for (key, value) in parse_params(raw) {
            if key == RID_PARAM_PT {
                self.formats = value
                    .split(',')
                    .filter_map(|pt| pt.trim().parse().ok())
                    .collect();
            } else {
                self.params.insert(key, value);
            }
        }
    }

    /// Inverse of [`RidInfo::parse_restrictions`], None when there is nothing to restrict.
    pub(crate) fn restrictions(&self) -> Option<String> {
        let mut parts = vec![];
        if !self.formats.is_empty() {
            let pts: Vec<String> = self.formats.iter().map(|pt| pt.to_string()).collect();
            parts.push(format!("{RID_PARAM_PT}={}", pts.join(",")));
        }
        if !self.params.is_empty() {
            parts.push(format_params(&self.params));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(";"))
        }
    }

    /// The same restriction seen from the other peer.
    pub fn reverse(&self) -> RidInfo {
        RidInfo {
            direction: self.direction.reverse(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_rid_restrictions() {
        let tests = vec![
            ("pt=96,97;max-width=1280", vec![96, 97], 1, "pt=96,97;max-width=1280"),
            ("max-fps=30", vec![], 1, "max-fps=30"),
            ("pt=100", vec![100], 0, "pt=100"),
        ];

        for (raw, formats, params, expected) in tests {
            let mut rid = RidInfo::new("hi", DirectionWay::Send);
            rid.parse_restrictions(raw);
            assert_eq!(rid.formats, formats);
            assert_eq!(rid.params.len(), params);
            assert_eq!(rid.restrictions(), Some(expected.to_owned()));
        }

        assert_eq!(RidInfo::new("lo", DirectionWay::Recv).restrictions(), None);
    }

    #[test]
    fn test_rid_reverse() {
        let rid = RidInfo::new("hi", DirectionWay::Send);
        let reversed = rid.reverse();
        assert_eq!(reversed.id, "hi");
        assert_eq!(reversed.direction, DirectionWay::Recv);
    }
}
