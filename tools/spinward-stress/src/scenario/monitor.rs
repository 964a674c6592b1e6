//! Producer/consumer handoff: consumers read the buffer only after seeing
//! `ready`, even when woken spuriously first.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

use anyhow::Result;
use spinward::Monitor;

use super::{ScenarioReport, Watch};

/// Resolved parameters.
#[derive(Debug, Clone)]
pub struct Params {
    pub consumers: usize,
    pub spurious: usize,
}

const PAYLOAD: [u32; 4] = [3, 1, 4, 1];

#[derive(Default)]
struct Mailbox {
    ready: bool,
    buffer: Vec<u32>,
}

pub fn run(p: &Params, watch: Watch) -> Result<ScenarioReport> {
    spinward::sw_info!(
        "monitor: {} consumers, {} spurious wakeups",
        p.consumers,
        p.spurious
    );
    let started = Instant::now();
    let mailbox = Monitor::new(Mailbox::default());
    let waiting = AtomicUsize::new(0);
    let wakes = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..p.consumers {
            s.spawn(|| {
                let mut m = mailbox.enter();
                waiting.fetch_add(1, Ordering::SeqCst);
                while !m.ready {
                    watch.exactly("buffer length before ready", m.buffer.len(), 0);
                    m = m.wait();
                    wakes.fetch_add(1, Ordering::Relaxed);
                }
                watch.exactly("buffer length after ready", m.buffer.len(), PAYLOAD.len());
                if m.buffer != PAYLOAD {
                    watch.fail(
                        "payload",
                        format_args!("got {:?}, expected {:?}", m.buffer, PAYLOAD),
                    );
                }
            });
        }

        // Consumers bump `waiting` with the monitor held and only release
        // it by waiting, so entering the monitor below finds them all asleep.
        while waiting.load(Ordering::SeqCst) < p.consumers {
            thread::yield_now();
        }
        for _ in 0..p.spurious {
            mailbox.notify_all();
            thread::yield_now();
        }
        mailbox.with(|m| {
            m.buffer.extend_from_slice(&PAYLOAD);
            m.ready = true;
        });
        mailbox.notify_all();
    });

    watch.finish("monitor")?;
    let wakes = wakes.into_inner();
    Ok(ScenarioReport::new("monitor", "monitor", started)
        .metric("consumers", p.consumers)
        .metric("wakes", wakes)
        .metric("extra-wakes", wakes.saturating_sub(p.consumers)))
}
