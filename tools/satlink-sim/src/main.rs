// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! satlink-sim - hub and satellites over a simulated radio
//!
//! Each satellite runs its own engine on an in-memory radio. Every round it says hello
//! (first round only) and pushes a state document; the datagrams go through a medium
//! that drops and reorders them before reaching the hub. The hub's replies are counted
//! per satellite and a summary is printed at the end.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;
use parking_lot::Mutex;
use satlink::{
    DestMode, FrameType, LinkConfig, MemoryRadio, PeerAddr, RxOutcome, SatLink, SatelliteHandler,
    SentFrame,
};

const HUB_ADDR: PeerAddr = PeerAddr::new([0x24, 0x6F, 0x28, 0x00, 0x00, 0x01]);

/// Satellite link simulator
#[derive(Parser, Debug)]
#[command(name = "satlink-sim")]
#[command(version = "0.1.0")]
#[command(about = "Run a hub and N satellites over a lossy in-memory radio")]
struct Args {
    /// Number of satellites
    #[arg(short = 'n', long, default_value = "4")]
    satellites: usize,

    /// State document size in bytes
    #[arg(short, long, default_value = "500")]
    size: usize,

    /// Rounds of state reports
    #[arg(short, long, default_value = "20")]
    rounds: u32,

    /// Datagram loss in percent
    #[arg(short, long, default_value = "0")]
    loss: u8,

    /// Deliver each round's datagrams in random order
    #[arg(long)]
    shuffle: bool,

    /// Seed for loss and ordering
    #[arg(long, default_value = "1")]
    seed: u64,

    /// Radio channel reported to satellites
    #[arg(long, default_value = "6")]
    channel: u8,

    /// Hub configuration file (YAML); SATLINK_* variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Default)]
struct HubTally {
    hellos: u64,
    states: HashMap<String, u64>,
}

/// Hub-side handler; shares its tally with `main`.
struct TallyHandler(Arc<Mutex<HubTally>>);

impl SatelliteHandler for TallyHandler {
    fn on_hello(&mut self, device_id: &str, peer: PeerAddr) {
        log::debug!("[sim] hello from {} at {}", device_id, peer);
        self.0.lock().hellos += 1;
    }

    fn on_state(&mut self, device_id: &str, _payload: &[u8]) {
        *self.0.lock().states.entry(device_id.to_string()).or_default() += 1;
    }
}

struct Satellite {
    device_id: String,
    addr: PeerAddr,
    link: SatLink,
    radio: Arc<MemoryRadio>,
}

struct Transit {
    from: PeerAddr,
    frame: SentFrame,
}

/// Medium between the satellites and the hub.
struct Medium {
    rng: fastrand::Rng,
    loss: u8,
    shuffle: bool,
    offered: u64,
    lost: u64,
}

impl Medium {
    fn carry(&mut self, mut batch: Vec<Transit>) -> Vec<Transit> {
        self.offered += batch.len() as u64;
        if self.shuffle {
            self.rng.shuffle(&mut batch);
        }
        let before = batch.len();
        let (loss, rng) = (self.loss, &mut self.rng);
        batch.retain(|_| rng.u8(..100) >= loss);
        self.lost += (before - batch.len()) as u64;
        batch
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    if args.satellites == 0 || args.satellites > 250 {
        bail!("--satellites must be in 1..=250");
    }
    if args.loss > 100 {
        bail!("--loss is a percentage");
    }

    let mut hub_config = match &args.config {
        Some(path) => LinkConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => LinkConfig::local_test(),
    };
    hub_config
        .apply_env()
        .context("applying SATLINK_* overrides")?;

    let hub_radio = Arc::new(MemoryRadio::new(args.channel));
    let mut hub = SatLink::new(hub_config.clone(), hub_radio.clone())?;
    let tally = Arc::new(Mutex::new(HubTally::default()));
    hub.set_handler(Box::new(TallyHandler(Arc::clone(&tally))));
    hub.start()?;

    let mut satellites = Vec::with_capacity(args.satellites);
    for i in 0..args.satellites {
        let radio = Arc::new(MemoryRadio::new(args.channel));
        let config = LinkConfig {
            rng_seed: Some(args.seed.wrapping_add(i as u64 + 1)),
            ..LinkConfig::local_test()
        };
        let mut link = SatLink::new(config, radio.clone())?;
        link.start()?;
        satellites.push(Satellite {
            device_id: format!("sat-{:03}", i),
            addr: PeerAddr::new([0x24, 0x6F, 0x28, 0x10, 0x00, i as u8]),
            link,
            radio,
        });
    }

    let mut medium = Medium {
        rng: fastrand::Rng::with_seed(args.seed),
        loss: args.loss,
        shuffle: args.shuffle,
        offered: 0,
        lost: 0,
    };
    let mut replies: HashMap<PeerAddr, u64> = HashMap::new();

    println!(
        "=== satlink-sim: {} satellites, {} B state, {} rounds, {}% loss{} ===\n",
        args.satellites,
        args.size,
        args.rounds,
        args.loss,
        if args.shuffle { ", shuffled" } else { "" }
    );
    let start = Instant::now();

    for round in 0..args.rounds {
        let mut batch = Vec::new();
        for sat in &satellites {
            let out = sat.link.outbound();
            if round == 0 {
                let hello = format!(r#"{{"t":"hello","deviceId":"{}"}}"#, sat.device_id);
                out.send_bare(&PeerAddr::BROADCAST, hello.as_bytes())?;
            }
            let doc = state_document(&sat.device_id, round, args.size);
            if let Err(e) = out.send_framed(&HUB_ADDR, FrameType::State, &doc) {
                log::warn!("[sim] {} failed to send state: {}", sat.device_id, e);
            }
            batch.extend(sat.radio.take_sent().into_iter().map(|frame| Transit {
                from: sat.addr,
                frame,
            }));
        }

        for transit in medium.carry(batch) {
            let dest = DestMode::of(&transit.frame.dest);
            if let RxOutcome::Dropped(reason) =
                hub.handle_datagram(transit.from, dest, &transit.frame.bytes)
            {
                log::debug!("[sim] hub dropped datagram from {}: {}", transit.from, reason);
            }
        }

        for reply in hub_radio.take_sent() {
            *replies.entry(reply.dest).or_default() += 1;
        }
    }

    let elapsed = start.elapsed();
    let router = hub.router_stats();
    let outbound = hub.outbound_stats();

    println!("Registry ({}/{}):", hub.satellites().len(), hub_config.registry_capacity);
    let tally = tally.lock();
    for entry in hub.satellites() {
        println!(
            "  {:<12} {}  states={:<4} replies={}",
            entry.device_id,
            entry.peer,
            tally.states.get(&entry.device_id).copied().unwrap_or(0),
            replies.get(&entry.peer).copied().unwrap_or(0)
        );
    }

    println!("\nMedium:");
    println!("  datagrams offered: {}", medium.offered);
    println!("  datagrams lost:    {}", medium.lost);

    println!("\nHub receive:");
    println!("  datagrams:   {}", router.datagrams);
    println!("  fragments:   {}", router.fragments);
    println!("  reassembled: {}", router.reassembled);
    println!("  hello:       {}", tally.hellos);
    println!("  state:       {}", router.state);
    println!("  dropped:     {}", router.dropped());

    println!("\nHub send:");
    println!("  frames:      {}", outbound.frames_sent);
    println!("  errors:      {}", outbound.send_errors);

    let expected = u64::from(args.rounds) * args.satellites as u64;
    println!(
        "\nDelivered {}/{} state reports in {:?}",
        router.state, expected, elapsed
    );
    Ok(())
}

/// State document of exactly `size` bytes (or the smallest valid one).
fn state_document(device_id: &str, round: u32, size: usize) -> Vec<u8> {
    let head = format!(
        r#"{{"t":"state","deviceId":"{}","seq":{},"temp":21.5,"pad":""#,
        device_id, round
    );
    let mut doc = head.into_bytes();
    let target = size.max(doc.len() + 2);
    doc.resize(target - 2, b'.');
    doc.extend_from_slice(b"\"}");
    doc
}
