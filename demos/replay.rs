// Copyright (C) 2023, Alex Badics
// This file is part of witmotion-orient
// Licensed under the MIT license. See LICENSE file in the project root for details.

use std::time::Duration;

use clap::Parser;
use witmotion_orient::{
    filter::Smoothing, producer::Producer, replay::ReplaySource, witmotion, Orientation,
};

/// Replay a synthetic, noisy sensor stream through the lock free channel,
/// no hardware needed.
#[derive(Parser)]
struct Args {
    /// Use a moving average of this many samples instead of the exponential filter
    #[arg(long)]
    window: Option<usize>,
    /// Exponential filter weight
    #[arg(long, default_value_t = Smoothing::DEFAULT_ALPHA)]
    alpha: f64,
    /// Number of frames to generate (at 50Hz)
    #[arg(long, default_value_t = 500)]
    frames: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "witmotion_orient=debug".into()),
        )
        .init();

    let args = Args::parse();
    let smoothing = match args.window {
        Some(window) => Smoothing::MovingAverage { window },
        None => Smoothing::Exponential { alpha: args.alpha },
    };

    // Slow yaw sweep with some jitter, and an unrelated packet type every
    // tenth notification.
    let packets = (0..args.frames).map(|i| {
        let t = i as f64 / 50.0;
        let jitter = if i % 2 == 0 { 1.5 } else { -1.5 };
        let reading = Orientation::new(jitter, 10.0 * t.sin(), 90.0 * (t / 4.0).sin() + jitter);
        let mut packet = if i % 10 == 0 {
            vec![0x55, 0x51, 0x00, 0x00, 0x00, 0x00]
        } else {
            Vec::new()
        };
        packet.extend(witmotion::encode(&reading));
        packet
    });
    let source = ReplaySource::new(packets).with_interval(Duration::from_millis(20));

    let (tx, mut rx) = witmotion_orient::channel::bounded(3, smoothing).unwrap();
    let producer = Producer::spawn(Box::new(source), tx, Duration::from_secs(2)).unwrap();

    let mut ticks = 0;
    while !rx.is_disconnected() {
        if let Some(angles) = rx.sample() {
            ticks += 1;
            if ticks == 50 {
                rx.calibrate();
            }
            if ticks % 10 == 0 {
                println!(
                    "roll {:7.2} pitch {:7.2} yaw {:7.2}  quaternion {:.4}",
                    angles.roll,
                    angles.pitch,
                    angles.yaw,
                    angles.to_unit_quaternion()
                );
            }
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    producer.stop().unwrap();
}
