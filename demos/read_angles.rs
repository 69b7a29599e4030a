// Copyright (C) 2023, Alex Badics
// This file is part of witmotion-orient
// Licensed under the MIT license. See LICENSE file in the project root for details.

use std::{
    io::{BufRead, Write},
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use clap::Parser;
use witmotion_orient::{config::Config, producer::Producer, serial::SerialSource};

/// Print calibrated angles of a WitMotion sensor behind a USB serial receiver.
/// Type `c` + Enter to calibrate, `r` to reset the calibration, `q` to quit.
#[derive(Parser)]
struct Args {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Serial port, e.g. /dev/ttyUSB0. Searched for if not given.
    #[arg(long)]
    port: Option<String>,
    /// Baud rate
    #[arg(long)]
    baud: Option<u32>,
    /// Consumer tick rate
    #[arg(long, default_value_t = 100)]
    hz: u32,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "witmotion_orient=info".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::load(path).unwrap(),
        None => Config::default(),
    };
    if args.port.is_some() {
        config.serial.port = args.port.clone();
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }

    let state = config.shared_state().unwrap();
    let source = SerialSource::from_config(&config.serial).unwrap();
    let producer = Producer::spawn(Box::new(source), state.clone(), config.stale_after).unwrap();

    let quit = Arc::new(AtomicBool::new(false));
    let quit_clone = quit.clone();
    let keys_state = state.clone();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line.unwrap().trim() {
                "c" => keys_state.calibrate(),
                "r" => keys_state.reset_calibration(),
                "q" => break,
                _ => (),
            }
        }
        quit_clone.store(true, Ordering::Relaxed);
    });

    let tick = Duration::from_secs_f64(1.0 / args.hz.max(1) as f64);
    while !quit.load(Ordering::Relaxed) && !producer.is_finished() {
        if let Some(angles) = state.sample() {
            let angles = config.axes.apply(angles);
            print!(
                "\rRoll: {:7.2}° | Pitch: {:7.2}° | Yaw: {:7.2}°",
                angles.roll, angles.pitch, angles.yaw
            );
            std::io::stdout().flush().unwrap();
        }
        std::thread::sleep(tick);
    }
    println!();
    producer.stop().unwrap();
}
