use super::*;
use crate::error_code::*;
use crate::xoraddr::XorMappedAddress;
use std::sync::{Arc, Mutex};

fn server() -> SocketAddr {
    "1.2.3.4:3478".parse().unwrap()
}

fn local() -> SocketAddr {
    "192.168.1.2:5000".parse().unwrap()
}

fn new_engine(config: BindingConfig) -> BindingRequestEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    BindingRequestEngine::new(config, local(), Box::new(LogDumper))
}

fn decode(buf: &[u8]) -> Result<Message> {
    let mut m = Message::new();
    m.unmarshal_binary(buf)?;
    Ok(m)
}

fn success_response(id: TransactionId, mapped: SocketAddr) -> Result<Vec<u8>> {
    let mut m = Message::new();
    m.build(&[&id, &BINDING_SUCCESS, &XorMappedAddress::from(mapped)])?;
    Ok(m.raw)
}

fn error_response(id: TransactionId, code: ErrorCode) -> Result<Vec<u8>> {
    let mut m = Message::new();
    m.build(&[
        &id,
        &BINDING_ERROR,
        &ErrorCodeAttribute {
            code,
            reason: b"try later".to_vec(),
        },
    ])?;
    Ok(m.raw)
}

/// Drives the engine until it has nothing left to do and returns the number
/// of datagrams it sent, including any still queued.
fn run_to_completion(engine: &mut BindingRequestEngine) -> Result<usize> {
    let mut sent = 0;
    while engine.poll_transmit().is_some() {
        sent += 1;
    }
    while let Some(t) = engine.poll_timeout() {
        engine.handle_timeout(t)?;
        while engine.poll_transmit().is_some() {
            sent += 1;
        }
    }
    Ok(sent)
}

#[derive(Default, Clone)]
struct RecordingDumper(Arc<Mutex<Vec<(DumpDirection, SocketAddr, usize)>>>);

impl PacketDumper for RecordingDumper {
    fn dump(&mut self, direction: DumpDirection, peer: SocketAddr, buf: &[u8]) {
        if let Ok(mut packets) = self.0.lock() {
            packets.push((direction, peer, buf.len()));
        }
    }
}

#[test]
fn test_send_queues_binding_request() -> Result<()> {
    let mut engine = new_engine(BindingConfig::default().with_software("test agent"));
    let now = Instant::now();

    let id = engine.send(BindingRequest::new(server(), now), now)?;
    assert_eq!(engine.pending_len(), 1);
    assert!(engine.is_pending(&id));

    let transmit = engine.poll_transmit().expect("binding request transmit");
    assert_eq!(transmit.transport.local_addr, local());
    assert_eq!(transmit.transport.peer_addr, server());
    assert_eq!(transmit.transport.transport_protocol, TransportProtocol::UDP);
    assert!(engine.poll_transmit().is_none());

    let m = decode(&transmit.message)?;
    assert_eq!(m.typ, BINDING_REQUEST);
    assert_eq!(m.transaction_id, id);

    let mut software = Software::default();
    software.get_from(&m)?;
    assert_eq!(software.0, "test agent");

    assert_eq!(engine.poll_timeout(), Some(now + DEFAULT_INITIAL_RTO));

    Ok(())
}

#[test]
fn test_check_response_matches_once() -> Result<()> {
    let mut engine = new_engine(BindingConfig::default());
    let now = Instant::now();
    let request = BindingRequest::new(server(), now);
    let id = engine.send(request, now)?;

    let mapped: SocketAddr = "203.0.113.7:40000".parse().unwrap();
    let response = success_response(id, mapped)?;
    let later = now + Duration::from_millis(42);

    assert!(engine.check_response(&response, server(), later));
    assert_eq!(engine.pending_len(), 0);

    match engine.poll_event() {
        Some(BindingEvent::Response {
            request: r,
            id: got,
            message,
            rtt,
        }) => {
            assert_eq!(r, request);
            assert_eq!(got, id);
            assert_eq!(rtt, Duration::from_millis(42));
            let mut addr = XorMappedAddress::default();
            addr.get_from(&message)?;
            assert_eq!(addr.socket_addr(), mapped);
        }
        other => panic!("expected response event, got {other:?}"),
    }
    assert!(engine.poll_event().is_none());

    // A retransmitted response for a completed transaction is dropped.
    assert!(!engine.check_response(&response, server(), later));
    assert!(engine.poll_event().is_none());

    Ok(())
}

#[test]
fn test_check_response_error_response() -> Result<()> {
    let mut engine = new_engine(BindingConfig::default());
    let now = Instant::now();
    let id = engine.send(BindingRequest::new(server(), now), now)?;

    let response = error_response(id, CODE_SERVER_ERROR)?;
    assert!(engine.check_response(&response, server(), now));

    match engine.poll_event() {
        Some(BindingEvent::ErrorResponse { id: got, message, .. }) => {
            assert_eq!(got, id);
            let mut code = ErrorCodeAttribute::default();
            code.get_from(&message)?;
            assert_eq!(code.code, CODE_SERVER_ERROR);
        }
        other => panic!("expected error response event, got {other:?}"),
    }

    Ok(())
}

#[test]
fn test_check_response_drops_unmatched_input() -> Result<()> {
    let mut engine = new_engine(BindingConfig::default());
    let now = Instant::now();
    let id = engine.send(BindingRequest::new(server(), now), now)?;

    let unknown = success_response(TransactionId::new(), server())?;
    let mut truncated = success_response(id, server())?;
    truncated.truncate(truncated.len() - 2);
    let mut request = Message::new();
    request.build(&[&id, &BINDING_REQUEST])?;

    let tests = vec![
        ("unknown transaction", unknown),
        ("truncated", truncated),
        ("not stun", b"hello world, this is not stun".to_vec()),
        ("request with same id", request.raw),
        ("empty", vec![]),
    ];

    for (name, buf) in tests {
        assert!(
            !engine.check_response(&buf, server(), now),
            "{name}: should not match"
        );
        assert!(engine.poll_event().is_none(), "{name}: unexpected event");
    }
    assert!(engine.is_pending(&id));

    Ok(())
}

#[test]
fn test_retransmissions_then_timeout() -> Result<()> {
    let mut engine = new_engine(BindingConfig::default());
    let now = Instant::now();
    let request = BindingRequest::new(server(), now);
    let id = engine.send(request, now)?;
    let first = engine.poll_transmit().expect("first transmit");

    let expected_deadlines_ms = [250u64, 750, 1750, 3750, 7750, 15750, 23750, 31750, 39750];
    for (i, ms) in expected_deadlines_ms.iter().enumerate() {
        let deadline = engine.poll_timeout().expect("deadline");
        assert_eq!(deadline, now + Duration::from_millis(*ms), "deadline {i}");
        engine.handle_timeout(deadline)?;

        if i + 1 < expected_deadlines_ms.len() {
            let t = engine.poll_transmit().expect("retransmit");
            assert_eq!(t.message, first.message, "retransmit {i} differs");
            assert!(engine.poll_event().is_none());
        }
    }

    assert!(engine.poll_transmit().is_none());
    match engine.poll_event() {
        Some(BindingEvent::Timeout { request: r, id: got }) => {
            assert_eq!(r, request);
            assert_eq!(got, id);
        }
        other => panic!("expected timeout event, got {other:?}"),
    }
    assert_eq!(engine.pending_len(), 0);
    assert_eq!(engine.poll_timeout(), None);

    Ok(())
}

#[test]
fn test_retransmission_window() -> Result<()> {
    let tests = vec![
        // (name, config, start offset before now, expected datagrams)
        ("defaults", BindingConfig::default(), Duration::ZERO, 9),
        (
            "short lifetime",
            BindingConfig::default().with_lifetime(Some(Duration::from_secs(1))),
            Duration::ZERO,
            3,
        ),
        (
            "retry budget nearly spent",
            BindingConfig::default(),
            Duration::from_millis(49_900),
            1,
        ),
        (
            "lifetime longer than retry budget",
            BindingConfig::default()
                .with_lifetime(Some(Duration::from_secs(600)))
                .with_retry_timeout(Duration::from_secs(2)),
            Duration::ZERO,
            4,
        ),
        (
            "no retransmissions",
            BindingConfig::default().with_max_retransmissions(0),
            Duration::ZERO,
            1,
        ),
    ];

    for (name, config, offset, expected) in tests {
        let mut engine = new_engine(config);
        let now = Instant::now() + Duration::from_secs(60);
        engine.send(BindingRequest::new(server(), now - offset), now)?;

        let sent = run_to_completion(&mut engine)?;
        assert_eq!(sent, expected, "{name}");

        let mut timeouts = 0;
        while let Some(event) = engine.poll_event() {
            assert!(matches!(event, BindingEvent::Timeout { .. }), "{name}");
            timeouts += 1;
        }
        assert_eq!(timeouts, 1, "{name}");
    }

    Ok(())
}

#[test]
fn test_rto_is_capped() -> Result<()> {
    let mut engine = new_engine(
        BindingConfig::default()
            .with_initial_rto(Duration::from_millis(100))
            .with_max_rto(Duration::from_millis(300)),
    );
    let now = Instant::now();
    engine.send(BindingRequest::new(server(), now), now)?;

    let mut previous = now;
    let mut intervals = vec![];
    while let Some(t) = engine.poll_timeout() {
        intervals.push(t - previous);
        previous = t;
        engine.handle_timeout(t)?;
    }

    let ms: Vec<u64> = intervals.iter().map(|d| d.as_millis() as u64).collect();
    assert_eq!(ms, vec![100, 200, 300, 300, 300, 300, 300, 300, 300]);

    Ok(())
}

#[test]
fn test_send_delayed() -> Result<()> {
    let mut engine = new_engine(BindingConfig::default());
    let now = Instant::now();
    let request = BindingRequest::new(server(), now);

    engine.send_delayed(request, Duration::from_secs(10), now)?;
    assert_eq!(engine.scheduled_len(), 1);
    assert_eq!(engine.pending_len(), 0);
    assert!(engine.poll_transmit().is_none());
    assert_eq!(engine.poll_timeout(), Some(now + Duration::from_secs(10)));

    engine.handle_timeout(now + Duration::from_secs(5))?;
    assert!(engine.poll_transmit().is_none());

    let due = now + Duration::from_secs(10);
    engine.handle_timeout(due)?;
    let t = engine.poll_transmit().expect("delayed transmit");
    assert_eq!(t.transport.peer_addr, server());
    assert_eq!(engine.scheduled_len(), 0);
    assert_eq!(engine.pending_len(), 1);
    assert_eq!(engine.poll_timeout(), Some(due + DEFAULT_INITIAL_RTO));

    // the chain keeps its original start time
    let id = decode(&t.message)?.transaction_id;
    let response = success_response(id, server())?;
    assert!(engine.check_response(&response, server(), due));
    match engine.poll_event() {
        Some(BindingEvent::Response { request: r, .. }) => assert_eq!(r.start_time, now),
        other => panic!("expected response event, got {other:?}"),
    }

    Ok(())
}

#[test]
fn test_duplicate_transaction_id() -> Result<()> {
    let mut engine = new_engine(BindingConfig::default());
    let now = Instant::now();
    let id = TransactionId([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);

    engine.send_with_id(BindingRequest::new(server(), now), id, now)?;
    let result = engine.send_with_id(BindingRequest::new(server(), now), id, now);
    assert_eq!(result, Err(Error::ErrTransactionExists));
    assert_eq!(engine.pending_len(), 1);

    Ok(())
}

#[test]
fn test_cancel() -> Result<()> {
    let mut engine = new_engine(BindingConfig::default());
    let now = Instant::now();
    let id = engine.send(BindingRequest::new(server(), now), now)?;

    assert!(engine.cancel(&id));
    assert!(!engine.cancel(&id));
    assert_eq!(run_to_completion(&mut engine)?, 0);
    assert!(engine.poll_event().is_none());

    let response = success_response(id, server())?;
    assert!(!engine.check_response(&response, server(), now));

    Ok(())
}

#[test]
fn test_cancel_keeps_other_transmits() -> Result<()> {
    let mut engine = new_engine(BindingConfig::default());
    let now = Instant::now();
    let other: SocketAddr = "5.6.7.8:3478".parse().unwrap();
    let cancelled = engine.send(BindingRequest::new(server(), now), now)?;
    let kept = engine.send(BindingRequest::new(other, now), now)?;

    assert!(engine.cancel(&cancelled));

    let transmit = engine.poll_transmit().expect("queued request");
    assert_eq!(transmit.transport.peer_addr, other);
    assert_eq!(decode(&transmit.message)?.transaction_id, kept);
    assert!(engine.poll_transmit().is_none());
    assert!(engine.is_pending(&kept));

    Ok(())
}

#[test]
fn test_handle_timeout_sends_every_due_request() -> Result<()> {
    let mut engine = new_engine(BindingConfig::default());
    let now = Instant::now();
    let delay = Duration::from_secs(1);
    for _ in 0..3 {
        engine.send_delayed(BindingRequest::new(server(), now), delay, now)?;
    }

    engine.handle_timeout(now + delay)?;

    let mut sent = 0;
    while engine.poll_transmit().is_some() {
        sent += 1;
    }
    assert_eq!(sent, 3);
    assert_eq!(engine.pending_len(), 3);
    assert_eq!(engine.scheduled_len(), 0);

    Ok(())
}

#[test]
fn test_close_drops_everything() -> Result<()> {
    let mut engine = new_engine(BindingConfig::default());
    let now = Instant::now();
    let id = engine.send(BindingRequest::new(server(), now), now)?;
    engine.send_delayed(BindingRequest::new(server(), now), Duration::from_secs(1), now)?;

    engine.close()?;
    assert!(engine.is_closed());
    assert!(engine.poll_transmit().is_none());
    assert_eq!(engine.poll_timeout(), None);

    let response = success_response(id, server())?;
    assert!(!engine.check_response(&response, server(), now));
    assert!(engine.poll_event().is_none());

    let tests = vec![
        (
            "send",
            engine.send(BindingRequest::new(server(), now), now).map(|_| ()),
        ),
        (
            "send_delayed",
            engine.send_delayed(BindingRequest::new(server(), now), Duration::ZERO, now),
        ),
        ("handle_timeout", engine.handle_timeout(now)),
        ("close", engine.close()),
    ];
    for (name, result) in tests {
        assert_eq!(result, Err(Error::ErrEngineClosed), "{name}");
    }

    Ok(())
}

#[test]
fn test_packet_dumper_sees_all_traffic() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let dumper = RecordingDumper::default();
    let packets = dumper.0.clone();
    let mut engine = BindingRequestEngine::new(
        BindingConfig::default().with_max_retransmissions(1),
        local(),
        Box::new(dumper),
    );
    let now = Instant::now();

    let id = engine.send(BindingRequest::new(server(), now), now)?;
    engine.handle_timeout(now + DEFAULT_INITIAL_RTO)?;
    let response = success_response(id, server())?;
    assert!(engine.check_response(&response, server(), now + DEFAULT_INITIAL_RTO));

    let packets = packets.lock()?;
    let directions: Vec<DumpDirection> = packets.iter().map(|p| p.0).collect();
    assert_eq!(
        directions,
        vec![
            DumpDirection::Outbound,
            DumpDirection::Outbound,
            DumpDirection::Inbound
        ]
    );
    assert!(packets.iter().all(|p| p.1 == server()));
    assert_eq!(packets[2].2, response.len());

    Ok(())
}

#[test]
fn test_protocol_surface() -> Result<()> {
    use sansio::Protocol;

    let mut engine = new_engine(BindingConfig::default());
    let now = Instant::now();

    Protocol::handle_write(&mut engine, BindingRequest::new(server(), now))?;
    let transmit = Protocol::poll_write(&mut engine).expect("transmit");
    let id = decode(&transmit.message)?.transaction_id;

    let response = success_response(id, server())?;
    Protocol::handle_read(
        &mut engine,
        TransportMessage {
            now,
            transport: TransportContext {
                local_addr: local(),
                peer_addr: server(),
                transport_protocol: TransportProtocol::UDP,
            },
            message: BytesMut::from(&response[..]),
        },
    )?;
    assert!(Protocol::poll_read(&mut engine).is_none());

    let event = Protocol::poll_event(&mut engine).expect("event");
    assert_eq!(event.transaction_id(), id);
    assert_eq!(event.request().server, server());
    assert_eq!(Protocol::poll_timeout(&mut engine), None);

    Ok(())
}
