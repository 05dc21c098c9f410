//! Channels and select across threads.

use std::thread;

use pretty_assertions::assert_eq;
use vo_reflect::{basic, chan_of, make_chan, select, value_of, zero, ChanDir, Kind, SelectCase, Value};

fn int_chan(buffer: usize) -> Value {
    make_chan(chan_of(ChanDir::Both, basic(Kind::Int)), buffer)
}

#[test]
fn test_unbuffered_handoff_between_threads() {
    let c = int_chan(0);
    let sender = thread::spawn(move || {
        for i in 0..5isize {
            c.send(value_of(i));
        }
        c.close();
    });
    let mut got = Vec::new();
    loop {
        let (v, ok) = c.recv();
        if !ok {
            break;
        }
        got.push(v.int());
    }
    sender.join().unwrap();
    assert_eq!(got, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_select_picks_ready_cases_uniformly() {
    let (a, b) = (int_chan(1), int_chan(1));
    let mut counts = [0usize; 2];
    for _ in 0..2000 {
        if a.len() == 0 {
            a.send(value_of(1isize));
        }
        if b.len() == 0 {
            b.send(value_of(2isize));
        }
        let (i, v, ok) = select(&[SelectCase::recv(a), SelectCase::recv(b)]);
        assert!(ok);
        assert_eq!(v.int(), i as i64 + 1);
        counts[i] += 1;
    }
    assert!(counts[0] > 800 && counts[1] > 800, "skewed choice: {counts:?}");
}

#[test]
fn test_select_send_and_recv_mix() {
    let (inbox, outbox) = (int_chan(1), int_chan(1));
    inbox.send(value_of(7isize));
    let cases = [SelectCase::recv(inbox), SelectCase::send(outbox, value_of(9isize))];
    let (i, v, _) = select(&cases);
    match i {
        0 => assert_eq!(v.int(), 7),
        1 => {
            assert!(!v.is_valid());
            assert_eq!(outbox.recv().0.int(), 9);
        }
        _ => unreachable!(),
    }
}

#[test]
fn test_select_wakes_on_later_send() {
    let c = int_chan(0);
    let nil = zero(chan_of(ChanDir::Both, basic(Kind::Int)));
    let sender = thread::spawn(move || c.send(value_of(3isize)));
    let (i, v, ok) = select(&[SelectCase::recv(nil), SelectCase::recv(c)]);
    sender.join().unwrap();
    assert_eq!((i, v.int(), ok), (1, 3, true));
}

#[test]
fn test_select_on_closed_channel() {
    let c = int_chan(0);
    c.close();
    let (i, v, ok) = select(&[SelectCase::recv(c), SelectCase::default_case()]);
    assert_eq!(i, 0);
    assert!(!ok);
    assert_eq!(v.int(), 0);
}

#[test]
#[should_panic(expected = "reflect.Select: multiple default cases")]
fn test_select_rejects_two_defaults() {
    select(&[SelectCase::default_case(), SelectCase::default_case()]);
}

#[test]
#[should_panic(expected = "reflect.Select: SendDir case using recv-only channel")]
fn test_select_send_on_recv_only() {
    let recv_only = zero(chan_of(ChanDir::Recv, basic(Kind::Int)));
    select(&[SelectCase::send(recv_only, value_of(1isize)), SelectCase::default_case()]);
}

#[test]
#[should_panic(expected = "reflect.MakeChan: unidirectional channel type")]
fn test_make_chan_requires_both_directions() {
    make_chan(chan_of(ChanDir::Send, basic(Kind::Int)), 0);
}

#[test]
#[should_panic(expected = "close of closed channel")]
fn test_double_close() {
    let c = int_chan(0);
    c.close();
    c.close();
}
