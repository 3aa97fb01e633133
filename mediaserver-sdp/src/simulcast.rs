use crate::direction::DirectionWay;
use crate::transform::parse_simulcast_stream_list;

/// One alternative of a simulcast stream list, `~` prefixed ids are paused.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct SimulcastStreamInfo {
    pub id: String,
    pub paused: bool,
}

impl SimulcastStreamInfo {
    pub fn new(id: &str, paused: bool) -> Self {
        SimulcastStreamInfo {
            id: id.to_owned(),
            paused,
        }
    }
}

/// Simulcast description of a media section (`a=simulcast`).
///
/// Each direction holds an ordered list of streams, and each stream an
/// ordered list of alternative formats for it.
///
/// ## Specifications
///
/// * [RFC 8853](https://datatracker.ietf.org/doc/html/rfc8853)
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct SimulcastInfo {
    pub send: Vec<Vec<SimulcastStreamInfo>>,
    pub recv: Vec<Vec<SimulcastStreamInfo>>,
}

impl SimulcastInfo {
    pub fn new() -> Self {
        SimulcastInfo::default()
    }

    pub fn add_alternatives(&mut self, direction: DirectionWay, streams: Vec<SimulcastStreamInfo>) {
        match direction {
            DirectionWay::Send => self.send.push(streams),
            DirectionWay::Recv => self.recv.push(streams),
            DirectionWay::Unspecified => {}
        }
    }

    pub fn streams(&self, direction: DirectionWay) -> &[Vec<SimulcastStreamInfo>] {
        match direction {
            DirectionWay::Send => &self.send,
            DirectionWay::Recv => &self.recv,
            DirectionWay::Unspecified => &[],
        }
    }

    pub(crate) fn parse_list(&mut self, direction: DirectionWay, raw: &str) {
        for group in parse_simulcast_stream_list(raw) {
            let streams = group
                .into_iter()
                .map(|(id, paused)| SimulcastStreamInfo { id, paused })
                .collect();
            self.add_alternatives(direction, streams);
        }
    }

    pub(crate) fn format_list(&self, direction: DirectionWay) -> Option<String> {
        let streams = self.streams(direction);
        if streams.is_empty() {
            return None;
        }
        let groups: Vec<String> = streams
            .iter()
            .map(|alternatives| {
                alternatives
                    .iter()
                    .map(|s| {
                        if s.paused {
                            format!("~{}", s.id)
                        } else {
                            s.id.clone()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .collect();
        Some(groups.join(";"))
    }

    /// The same simulcast description seen from the other peer.
    pub fn reverse(&self) -> SimulcastInfo {
        SimulcastInfo {
            send: self.recv.clone(),
            recv: self.send.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.send.is_empty() && self.recv.is_empty()
    }
}
