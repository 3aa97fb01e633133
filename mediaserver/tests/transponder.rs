mod common;

use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::Result;
use common::{FakeTransportEngine, TransponderCall, endpoint, init_log};
use mediaserver::engine::{LayerStats, MAX_LAYER_ID, SourceGroupSsrcs};
use mediaserver::stream::{IncomingStreamTrack, OutgoingStreamTrack};
use mediaserver::{LayerTraversal, Transport};
use sdp::track::SOURCE_GROUP_SIM;
use sdp::{MediaKind, SourceGroupInfo, StreamInfo, TrackInfo};
use shared::error::Error;

struct Fixture {
    transport: Arc<Transport>,
    engine: Arc<FakeTransportEngine>,
    incoming: Arc<IncomingStreamTrack>,
    outgoing: Arc<OutgoingStreamTrack>,
}

/// Transport receiving a three encoding simulcast track at 100, 300 and
/// 800 kbps, plus an outgoing video track to forward it on.
fn simulcast_fixture() -> Result<Fixture> {
    let (endpoint, bundle) = endpoint();
    let (remote_endpoint, _) = common::endpoint();
    let remote = remote_endpoint.create_offer(&common::capabilities());

    let transport = endpoint.create_transport(&remote, None)?;
    let engine = bundle.last_transport().expect("engine transport");

    let mut track = TrackInfo::new("camera", MediaKind::Video);
    for ssrc in [1, 2, 3] {
        track.add_ssrc(ssrc);
    }
    track.add_source_group(SourceGroupInfo::new(SOURCE_GROUP_SIM, vec![1, 2, 3]));
    let mut stream = StreamInfo::new("remote");
    stream.add_track(track);

    let incoming_stream = transport.create_incoming_stream(&stream)?;
    let incoming = incoming_stream.track("camera").expect("incoming track");

    for (ssrc, bitrate) in [(1, 100_000), (2, 300_000), (3, 800_000)] {
        engine.incoming_source(ssrc).expect("incoming source").set_bitrate(bitrate);
    }

    let outgoing = transport.create_outgoing_stream_track(MediaKind::Video, Some("forward"), SourceGroupSsrcs::default())?;

    Ok(Fixture {
        transport,
        engine,
        incoming,
        outgoing,
    })
}

#[test]
fn test_transponder_selects_best_layer_below_target() -> Result<()> {
    init_log();

    let f = simulcast_fixture()?;
    let transponder = f.outgoing.attach_to(&f.incoming)?;

    let achieved = transponder.set_target_bitrate(500_000, LayerTraversal::SpatialTemporal, false)?;
    assert_eq!(achieved, 300_000);
    assert_eq!(transponder.encoding_id().as_deref(), Some("1"));
    assert!(!transponder.is_muted());

    let achieved = transponder.set_target_bitrate(1_000_000, LayerTraversal::SpatialTemporal, false)?;
    assert_eq!(achieved, 800_000);
    assert_eq!(transponder.encoding_id().as_deref(), Some("2"));

    Ok(())
}

#[test]
fn test_transponder_selection_is_monotonic() -> Result<()> {
    init_log();

    let f = simulcast_fixture()?;
    let transponder = f.outgoing.attach_to(&f.incoming)?;

    let tests = vec![
        (0, 100_000),
        (50_000, 100_000),
        (100_000, 100_000),
        (299_999, 100_000),
        (300_000, 300_000),
        (500_000, 300_000),
        (800_000, 800_000),
        (5_000_000, 800_000),
    ];

    for traversal in [
        LayerTraversal::SpatialTemporal,
        LayerTraversal::ZigZagSpatialTemporal,
        LayerTraversal::TemporalSpatial,
        LayerTraversal::ZigZagTemporalSpatial,
    ] {
        let mut previous = 0;
        for (target, expected) in &tests {
            let achieved = transponder.set_target_bitrate(*target, traversal, false)?;
            assert_eq!(achieved, *expected, "{traversal} at {target}");
            assert!(achieved >= previous, "{traversal} at {target}");
            previous = achieved;
        }
    }

    Ok(())
}

#[test]
fn test_transponder_strict_mutes() -> Result<()> {
    init_log();

    let f = simulcast_fixture()?;
    let transponder = f.outgoing.attach_to(&f.incoming)?;

    let mutes = Arc::new(Mutex::new(vec![]));
    let mutes2 = Arc::clone(&mutes);
    transponder.on_muted(move |muted| mutes2.lock().unwrap().push(muted));

    assert_eq!(transponder.set_target_bitrate(50_000, LayerTraversal::SpatialTemporal, true)?, 0);
    assert!(transponder.is_muted());

    // muting twice is not notified again
    assert_eq!(transponder.set_target_bitrate(10_000, LayerTraversal::SpatialTemporal, true)?, 0);

    assert_eq!(transponder.set_target_bitrate(500_000, LayerTraversal::SpatialTemporal, true)?, 300_000);
    assert!(!transponder.is_muted());
    assert_eq!(*mutes.lock().unwrap(), vec![true, false]);

    let outgoing_ssrc = f.outgoing.ssrcs().media.expect("outgoing ssrc");
    let calls = f.engine.transponder_calls(outgoing_ssrc).expect("transponder calls");
    let calls = calls.lock().unwrap();
    assert_eq!(calls.iter().filter(|c| **c == TransponderCall::Mute(true)).count(), 1);
    assert_eq!(calls.iter().filter(|c| **c == TransponderCall::Mute(false)).count(), 1);

    Ok(())
}

#[test]
fn test_transponder_svc_layers_and_maximum() -> Result<()> {
    init_log();

    let (endpoint, bundle) = endpoint();
    let (remote_endpoint, _) = common::endpoint();
    let remote = remote_endpoint.create_offer(&common::capabilities());
    let transport = endpoint.create_transport(&remote, None)?;
    let engine = bundle.last_transport().expect("engine transport");

    let incoming = transport.create_incoming_stream_track(MediaKind::Video, Some("svc"), SourceGroupSsrcs::new(10))?;
    let source = engine.incoming_source(10).expect("incoming source");
    source.set_bitrate(450_000);
    source.set_layers(vec![
        LayerStats::new(0, 0, 100_000),
        LayerStats::new(0, 1, 150_000),
        LayerStats::new(1, 0, 300_000),
        LayerStats::new(1, 1, 450_000),
    ]);

    let outgoing = transport.create_outgoing_stream_track(MediaKind::Video, None, SourceGroupSsrcs::default())?;
    let transponder = outgoing.attach_to(&incoming)?;
    assert_eq!(transponder.maximum_layers(), (MAX_LAYER_ID, MAX_LAYER_ID));

    assert_eq!(transponder.set_target_bitrate(400_000, LayerTraversal::SpatialTemporal, false)?, 300_000);
    assert_eq!((transponder.spatial_layer_id(), transponder.temporal_layer_id()), (1, 0));

    transponder.set_maximum_layers(0, MAX_LAYER_ID)?;
    assert_eq!(transponder.set_target_bitrate(1_000_000, LayerTraversal::SpatialTemporal, false)?, 150_000);
    assert_eq!((transponder.spatial_layer_id(), transponder.temporal_layer_id()), (0, 1));

    transponder.set_maximum_layers(0, 0)?;
    transponder.select_layer(2, 2)?;
    assert_eq!((transponder.spatial_layer_id(), transponder.temporal_layer_id()), (0, 0));

    let calls = engine
        .transponder_calls(outgoing.ssrcs().media.expect("outgoing ssrc"))
        .expect("transponder calls");
    let calls = calls.lock().unwrap();
    assert_eq!(
        calls
            .iter()
            .filter(|c| matches!(c, TransponderCall::SelectLayer(..)))
            .cloned()
            .collect::<Vec<_>>(),
        vec![
            TransponderCall::SelectLayer(1, 0),
            TransponderCall::SelectLayer(0, 1),
            TransponderCall::SelectLayer(0, 0),
        ]
    );

    Ok(())
}

#[test]
fn test_transponder_attach_counter() -> Result<()> {
    init_log();

    let f = simulcast_fixture()?;
    let second = f
        .transport
        .create_outgoing_stream_track(MediaKind::Video, None, SourceGroupSsrcs::default())?;

    f.outgoing.attach_to(&f.incoming)?;
    second.attach_to(&f.incoming)?;
    assert_eq!(f.incoming.attach_count(), 2);

    let source = f.engine.incoming_source(1).expect("incoming source");
    assert_eq!(source.attached_count(), 1);

    f.outgoing.detach();
    assert_eq!(f.incoming.attach_count(), 1);
    assert_eq!(source.detached_count(), 0);

    second.detach();
    assert_eq!(f.incoming.attach_count(), 0);
    assert_eq!(source.detached_count(), 1);

    // detaching without a transponder is a no-op
    second.detach();
    assert_eq!(f.incoming.attach_count(), 0);

    Ok(())
}

#[test]
fn test_transponder_stop() -> Result<()> {
    init_log();

    let f = simulcast_fixture()?;
    let transponder = f.outgoing.attach_to(&f.incoming)?;

    let stops = Arc::new(Mutex::new(0));
    let stops2 = Arc::clone(&stops);
    transponder.on_stopped(move || *stops2.lock().unwrap() += 1);

    transponder.stop();
    transponder.stop();

    assert!(transponder.is_stopped());
    assert_eq!(*stops.lock().unwrap(), 1);
    assert_eq!(f.incoming.attach_count(), 0);
    assert!(f.outgoing.transponder().is_none());

    assert!(matches!(
        transponder.set_target_bitrate(500_000, LayerTraversal::SpatialTemporal, false),
        Err(Error::ErrClosed)
    ));
    assert!(matches!(
        transponder.set_incoming_track(Some(Arc::clone(&f.incoming))),
        Err(Error::ErrClosed)
    ));

    let calls = f
        .engine
        .transponder_calls(f.outgoing.ssrcs().media.expect("outgoing ssrc"))
        .expect("transponder calls");
    let calls = calls.lock().unwrap();
    assert_eq!(calls.iter().filter(|c| **c == TransponderCall::Close).count(), 1);
    assert_eq!(calls.last(), Some(&TransponderCall::Close));

    Ok(())
}

#[test]
fn test_transponder_stops_with_incoming_track() -> Result<()> {
    init_log();

    let f = simulcast_fixture()?;
    let transponder = f.outgoing.attach_to(&f.incoming)?;
    let sources = f.engine.incoming_sources();
    assert_eq!(sources.len(), 3);

    f.incoming.stop();

    // the engine hears about the lost consumer before the sources go away
    assert_eq!(f.incoming.attach_count(), 0);
    for source in &sources {
        assert_eq!(source.attached_count(), 1);
        assert_eq!(source.detached_count(), 1);
    }
    assert!(transponder.is_stopped());
    assert!(transponder.incoming_track().is_none());
    assert!(f.outgoing.transponder().is_none());
    assert!(f.engine.incoming_sources().is_empty());

    // a stopped track cannot be forwarded again
    assert!(f.outgoing.attach_to(&f.incoming).is_err());

    Ok(())
}

#[test]
fn test_transponder_rejects_missing_track() -> Result<()> {
    init_log();

    let f = simulcast_fixture()?;
    let transponder = f.outgoing.attach_to(&f.incoming)?;

    assert!(matches!(
        transponder.set_incoming_track(None),
        Err(Error::ErrInvalidArgument(_))
    ));
    assert!(matches!(
        transponder.select_encoding("7"),
        Err(Error::ErrInvalidArgument(_))
    ));

    // the bound track survives the rejected calls
    assert!(transponder.incoming_track().is_some());
    assert_eq!(f.incoming.attach_count(), 1);

    Ok(())
}

#[test]
fn test_incoming_track_stop_releases_attachments() -> Result<()> {
    init_log();

    let f = simulcast_fixture()?;
    let source = f.engine.incoming_source(1).expect("incoming source");

    // a consumer that never detaches on its own
    f.incoming.attached();
    f.incoming.attached();
    assert_eq!(source.attached_count(), 1);

    f.incoming.stop();
    f.incoming.stop();
    assert_eq!(f.incoming.attach_count(), 0);
    assert_eq!(source.detached_count(), 1);

    Ok(())
}

fn closed_or_ok<T>(result: &shared::error::Result<T>) -> bool {
    matches!(result, Ok(_) | Err(Error::ErrClosed))
}

#[test]
fn test_transponder_target_bitrate_races_stop() -> Result<()> {
    init_log();

    for _ in 0..20 {
        let f = simulcast_fixture()?;
        let transponder = f.outgoing.attach_to(&f.incoming)?;

        let selector = {
            let transponder = Arc::clone(&transponder);
            thread::spawn(move || {
                (0..200u64)
                    .map(|i| transponder.set_target_bitrate(i * 5_000, LayerTraversal::SpatialTemporal, i % 2 == 0))
                    .collect::<Vec<_>>()
            })
        };
        let stopper = {
            let transponder = Arc::clone(&transponder);
            thread::spawn(move || transponder.stop())
        };

        stopper.join().expect("stopper thread");
        let results = selector.join().expect("selector thread");
        assert!(results.iter().all(closed_or_ok), "{results:?}");

        assert!(transponder.is_stopped());
        assert_eq!(f.incoming.attach_count(), 0);
        assert!(matches!(
            transponder.set_target_bitrate(500_000, LayerTraversal::SpatialTemporal, false),
            Err(Error::ErrClosed)
        ));
    }

    Ok(())
}

#[test]
fn test_transponder_target_bitrate_races_track_swap() -> Result<()> {
    init_log();

    let f = simulcast_fixture()?;
    let other = f
        .transport
        .create_incoming_stream_track(MediaKind::Video, Some("other"), SourceGroupSsrcs::new(20))?;
    f.engine.incoming_source(20).expect("incoming source").set_bitrate(250_000);

    let transponder = f.outgoing.attach_to(&f.incoming)?;

    let selector = {
        let transponder = Arc::clone(&transponder);
        thread::spawn(move || {
            (0..500u64)
                .map(|i| transponder.set_target_bitrate(i * 2_000, LayerTraversal::ZigZagSpatialTemporal, false))
                .collect::<Vec<_>>()
        })
    };
    let swapper = {
        let transponder = Arc::clone(&transponder);
        let tracks = [Arc::clone(&f.incoming), Arc::clone(&other)];
        thread::spawn(move || {
            let mut results = vec![];
            for i in 0..100 {
                results.push(transponder.set_incoming_track(Some(Arc::clone(&tracks[i % 2]))));
            }
            transponder.stop();
            results
        })
    };

    let swaps = swapper.join().expect("swapper thread");
    let selections = selector.join().expect("selector thread");
    assert!(swaps.iter().all(closed_or_ok), "{swaps:?}");
    assert!(selections.iter().all(closed_or_ok), "{selections:?}");

    // every attachment was released by the final stop
    assert!(transponder.is_stopped());
    assert_eq!(f.incoming.attach_count(), 0);
    assert_eq!(other.attach_count(), 0);

    Ok(())
}
