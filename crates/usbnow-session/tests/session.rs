mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use common::{connect, error, ok, reply, wait_until};
use usbnow_frame::{CommandOpcode, Frame, ResponseOpcode};
use usbnow_session::{DeviceAddress, PeerRecord, SendStatus, SessionError};

const SHORT: Duration = Duration::from_millis(200);
const LONG: Duration = Duration::from_secs(2);

const PEER: DeviceAddress = DeviceAddress::new([0x24, 0x6F, 0x28, 0xAA, 0xBB, 0xCC]);

fn is(frame: &Frame, opcode: CommandOpcode) -> bool {
    frame.opcode == opcode.code()
}

#[test]
fn init_ok() {
    let (session, device) = connect(LONG, |_, _| vec![ok()]);

    session.init().unwrap();

    assert_eq!(device.received(), vec![Frame::new(0, Vec::new())]);
}

#[test]
fn get_version_decodes_reply() {
    let (session, _device) = connect(LONG, |frame, _| {
        if is(frame, CommandOpcode::GetVersion) {
            vec![reply(ResponseOpcode::Version, &[0x01, 0x00, 0x00, 0x00]), ok()]
        } else {
            vec![ok()]
        }
    });

    assert_eq!(session.get_version().unwrap(), 1);
}

#[test]
fn device_error_is_returned_as_text() {
    let (session, device) = connect(LONG, |_, _| vec![error("no peer")]);

    let err = session.send(DeviceAddress::BROADCAST, b"hi").unwrap_err();
    match err {
        SessionError::Device(message) => assert_eq!(message, "no peer"),
        other => panic!("unexpected error: {other:?}"),
    }

    let sent = device.received();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].opcode, CommandOpcode::Send.code());
    assert_eq!(
        sent[0].payload.as_ref(),
        &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, b'h', b'i']
    );
}

#[test]
fn timeout_then_next_command_succeeds() {
    let (session, _device) = connect(SHORT, |frame, _| {
        if is(frame, CommandOpcode::Deinit) {
            Vec::new()
        } else {
            vec![ok()]
        }
    });

    let err = session.deinit().unwrap_err();
    assert!(matches!(err, SessionError::Timeout(d) if d == SHORT));

    session.init().unwrap();
    session.init().unwrap();
}

#[test]
fn late_terminal_does_not_release_next_wait() {
    let (session, device) = connect(SHORT, |frame, _| {
        if is(frame, CommandOpcode::Deinit) {
            Vec::new()
        } else {
            vec![ok()]
        }
    });

    assert!(matches!(session.deinit(), Err(SessionError::Timeout(_))));

    // The OK for the abandoned command turns up after the timeout.
    device.link.emit(&ok());
    assert!(wait_until(|| session.stats().late_terminals == 1));

    session.init().unwrap();
    assert_eq!(session.stats().late_terminals, 1);
}

#[test]
fn notifications_do_not_resolve_wait_or_enter_ring() {
    let received = Arc::new(Mutex::new(Vec::<(DeviceAddress, Bytes)>::new()));
    let completions = Arc::new(Mutex::new(Vec::<(DeviceAddress, SendStatus)>::new()));

    let (session, _device) = connect(LONG, |frame, link| {
        if is(frame, CommandOpcode::GetVersion) {
            link.emit(&reply(ResponseOpcode::Version, &[7, 0, 0, 0]));
            // Notifications between the reply and the terminal.
            let mut recv = PEER.octets().to_vec();
            recv.extend_from_slice(b"ping");
            link.emit(&reply(ResponseOpcode::RecvCb, &recv));
            let mut sent = PEER.octets().to_vec();
            sent.push(1);
            link.emit(&reply(ResponseOpcode::SendCb, &sent));
            thread::sleep(Duration::from_millis(50));
            vec![ok()]
        } else {
            vec![ok()]
        }
    });

    let sink = Arc::clone(&received);
    session.set_receive_handler(move |addr, data| sink.lock().unwrap().push((addr, data)));
    let sink = Arc::clone(&completions);
    session.set_send_handler(move |addr, status| sink.lock().unwrap().push((addr, status)));

    assert_eq!(session.get_version().unwrap(), 7);

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].0, PEER);
    assert_eq!(received[0].1.as_ref(), b"ping");
    assert_eq!(*completions.lock().unwrap(), vec![(PEER, SendStatus::Failure)]);
}

#[test]
fn unsolicited_notifications_reach_handler() {
    let (session, device) = connect(LONG, |_, _| vec![ok()]);
    let received = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&received);
    session.set_receive_handler(move |addr, data: Bytes| {
        sink.lock().unwrap().push((addr, data.to_vec()));
    });

    let mut payload = DeviceAddress::BROADCAST.octets().to_vec();
    payload.extend_from_slice(&[0xC0, 0xDB, 0x00]);
    device.link.emit(&reply(ResponseOpcode::RecvCb, &payload));

    assert!(wait_until(|| received.lock().unwrap().len() == 1));
    assert_eq!(
        received.lock().unwrap()[0],
        (DeviceAddress::BROADCAST, vec![0xC0, 0xDB, 0x00])
    );

    session.clear_receive_handler();
    device.link.emit(&reply(ResponseOpcode::RecvCb, &payload));
    assert!(wait_until(|| session.stats().frames == 2));
    assert_eq!(received.lock().unwrap().len(), 1);
}

#[test]
fn exactly_one_command_in_flight() {
    let overlapped = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&overlapped);

    let (session, device) = connect(LONG, move |_, link| {
        // Anything written while this command is unanswered is an overlap.
        thread::sleep(Duration::from_millis(20));
        if link.pending() > 0 {
            flag.store(true, Ordering::SeqCst);
        }
        vec![ok()]
    });
    let session = Arc::new(session);

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                for _ in 0..3 {
                    session.init().unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert!(!overlapped.load(Ordering::SeqCst));
    assert_eq!(device.received().len(), 12);
}

#[test]
fn newest_informational_reply_wins() {
    let (session, _device) = connect(LONG, |frame, _| {
        if is(frame, CommandOpcode::GetVersion) {
            let mut replies: Vec<Frame> = (1..=11u8)
                .map(|n| reply(ResponseOpcode::Version, &[n, 0, 0, 0]))
                .collect();
            replies.push(ok());
            replies
        } else {
            vec![ok()]
        }
    });

    assert_eq!(session.get_version().unwrap(), 11);
}

#[test]
fn missing_or_mismatched_reply_is_protocol_error() {
    let (session, _device) = connect(LONG, |frame, _| {
        if is(frame, CommandOpcode::GetDeviceAddress) {
            vec![ok()]
        } else if is(frame, CommandOpcode::IsPeerExist) {
            vec![reply(ResponseOpcode::PeerCount, &[1, 0, 0, 0]), ok()]
        } else {
            vec![ok()]
        }
    });

    assert!(matches!(
        session.get_device_address(),
        Err(SessionError::Protocol(_))
    ));
    assert!(matches!(
        session.is_peer_exist(PEER),
        Err(SessionError::Protocol(_))
    ));
    session.init().unwrap();
}

#[test]
fn firmware_rejections_fail_only_the_command() {
    let (session, _device) = connect(LONG, |frame, _| {
        if is(frame, CommandOpcode::SetPmk) {
            vec![reply(ResponseOpcode::ErrorLen, &[])]
        } else if is(frame, CommandOpcode::ConfigRate) {
            // Unknown-command rejection is followed by a stray OK.
            vec![reply(ResponseOpcode::ErrorUnknown, &[]), ok()]
        } else {
            vec![ok()]
        }
    });

    assert!(matches!(
        session.set_pmk(&[0x11; 16]),
        Err(SessionError::Protocol(_))
    ));
    assert!(matches!(
        session.config_rate(0, 0x0B),
        Err(SessionError::Protocol(_))
    ));
    assert!(wait_until(|| session.stats().late_terminals == 1));

    session.init().unwrap();
    assert!(!session.is_closed());
}

#[test]
fn delayed_trailer_after_unknown_command_does_not_release_next_command() {
    let (session, _device) = connect(LONG, |frame, link| {
        if is(frame, CommandOpcode::ConfigRate) {
            link.emit(&reply(ResponseOpcode::ErrorUnknown, &[]));
            thread::sleep(Duration::from_millis(20));
            vec![ok()]
        } else if is(frame, CommandOpcode::GetVersion) {
            thread::sleep(Duration::from_millis(10));
            vec![reply(ResponseOpcode::Version, &[3, 0, 0, 0]), ok()]
        } else {
            vec![ok()]
        }
    });

    assert!(matches!(
        session.config_rate(0, 0x0B),
        Err(SessionError::Protocol(_))
    ));
    assert_eq!(session.get_version().unwrap(), 3);
    assert_eq!(session.stats().late_terminals, 1);
}

#[test]
fn panicking_handler_keeps_session_alive() {
    let (session, device) = connect(SHORT, |_, _| vec![ok()]);
    session.set_receive_handler(|_, _| panic!("handler failure"));

    let mut payload = PEER.octets().to_vec();
    payload.push(0x01);
    device.link.emit(&reply(ResponseOpcode::RecvCb, &payload));
    assert!(wait_until(|| session.stats().handler_panics == 1));

    assert!(!session.is_closed());
    session.init().unwrap();
}

#[test]
fn peer_table_commands() {
    let (session, device) = connect(LONG, |frame, _| {
        let mut peer = PEER.octets().to_vec();
        peer.extend_from_slice(&[6, 1]);
        match CommandOpcode::try_from(frame.opcode) {
            Ok(CommandOpcode::GetPeer) | Ok(CommandOpcode::FetchPeer) => {
                vec![reply(ResponseOpcode::Peer, &peer), ok()]
            }
            Ok(CommandOpcode::IsPeerExist) => vec![reply(ResponseOpcode::PeerExist, &[1]), ok()],
            Ok(CommandOpcode::GetPeerCount) => vec![reply(ResponseOpcode::PeerCount, &[1, 0]), ok()],
            Ok(CommandOpcode::GetDeviceAddress) => {
                vec![reply(ResponseOpcode::Address, &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]), ok()]
            }
            _ => vec![ok()],
        }
    });

    let record = PeerRecord::new(PEER, 6, true).unwrap();
    session.add_peer(&record).unwrap();
    session.mod_peer(&record).unwrap();
    assert_eq!(session.get_peer(PEER).unwrap(), record);
    assert_eq!(session.fetch_peer(true).unwrap(), record);
    assert!(session.is_peer_exist(PEER).unwrap());
    assert_eq!(session.get_peer_count().unwrap(), 1);
    assert_eq!(
        session.get_device_address().unwrap().to_string(),
        "AA:BB:CC:DD:EE:FF"
    );
    session.del_peer(PEER).unwrap();
    session.set_wake_window(0x1234).unwrap();

    let sent = device.received();
    let opcodes: Vec<u8> = sent.iter().map(|f| f.opcode).collect();
    assert_eq!(opcodes, vec![4, 6, 8, 9, 10, 11, 14, 5, 13]);
    assert_eq!(sent[0].payload.as_ref(), &[0x24, 0x6F, 0x28, 0xAA, 0xBB, 0xCC, 6, 1]);
    assert_eq!(sent[3].payload.as_ref(), &[1]);
    assert_eq!(sent[8].payload.as_ref(), &[0x12, 0x34]);
}

#[test]
fn corrupted_terminal_is_dropped_and_counted() {
    let (session, _device) = connect(SHORT, |frame, link| {
        if is(frame, CommandOpcode::Deinit) {
            // OK frame with a broken checksum.
            link.emit_raw(&[0x00, 0x02, 0x00, 0x00, 0x00, 0xC0]);
            Vec::new()
        } else {
            vec![ok()]
        }
    });

    assert!(matches!(session.deinit(), Err(SessionError::Timeout(_))));
    assert_eq!(session.stats().checksum_mismatch, 1);
    session.init().unwrap();
}

#[test]
fn device_disconnect_closes_pending_wait() {
    let (session, _device) = connect(LONG, |frame, link| {
        if is(frame, CommandOpcode::Init) {
            link.close();
        }
        Vec::new()
    });

    assert!(matches!(session.init(), Err(SessionError::ChannelClosed)));
    assert!(wait_until(|| session.is_closed()));
    assert!(matches!(session.deinit(), Err(SessionError::ChannelClosed)));
}

#[test]
fn close_is_idempotent_and_fails_later_commands() {
    let (session, _device) = connect(LONG, |_, _| vec![ok()]);

    session.init().unwrap();
    session.close().unwrap();
    session.close().unwrap();

    assert!(session.is_closed());
    assert!(matches!(session.get_version(), Err(SessionError::ChannelClosed)));
}
