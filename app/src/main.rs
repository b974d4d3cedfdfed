use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use std::{env, io, process, thread};

use log::{error, info, LevelFilter};
use rppal::gpio::Level;

use door_access_controller::config::Config;
use door_access_controller::gpio::{self, DoorSensor, LedIndicator, Pins};
use door_access_controller::mqtt::MqttRouter;
use door_access_controller::router::{MessageRouter, NullRouter};
use door_access_controller::{http, term_on_err, Controller, Snapshot};

const CONFIG_ENV: &str = "DOOR_ACCESS_CONFIG";
const SELF_TEST_FLASHES: u8 = 2;

fn main() -> Result<(), io::Error> {
    let config_path = env::args().nth(1).or_else(|| env::var(CONFIG_ENV).ok());
    let loaded = Config::load(config_path.as_deref());
    init_logging(
        loaded
            .as_ref()
            .map(|config| config.log_level)
            .unwrap_or(LevelFilter::Info),
    );
    let config = match loaded {
        Ok(config) => config,
        Err(err) => {
            error!("configuration error: {}", err);
            eprintln!("configuration error: {}", err);
            process::exit(1);
        }
    };
    info!("starting with {:?} authority", config.authority);

    let term = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&term))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&term))?;

    let snapshot = Arc::new(RwLock::new(Snapshot::default()));
    let mut threads = Vec::new();

    // Start HTTP server
    let server = match &config.http_addr {
        Some(addr) => match http::Server::new(addr.as_str()) {
            Ok(server) => {
                info!("http server running on {}", addr);
                Some(Arc::new(server))
            }
            Err(err) => {
                error!("Unable to start http server on {}: {}", addr, err);
                process::exit(1);
            }
        },
        None => None,
    };
    if let Some(server) = &server {
        let snapshot = Arc::clone(&snapshot);
        let server = Arc::clone(server);
        let thread = thread::spawn(move || {
            server.handle_requests(snapshot);
            info!("server thread exiting");
        });
        threads.push(thread);
    }

    // The controller is pointless without the door sensor, so GPIO failures are fatal.
    let pins = Pins {
        door: config.gpio.door_pin,
        granted_led: config.gpio.granted_led_pin,
        denied_led: config.gpio.denied_led_pin,
        door_open_level: if config.gpio.door_open_high {
            Level::High
        } else {
            Level::Low
        },
    };
    let (sensor, mut indicator) = match gpio::setup_gpio(&pins) {
        Ok(devices) => devices,
        Err(err) => {
            error!("Unable to set up GPIO: {}", err);
            if let Some(server) = &server {
                server.shutdown();
            }
            process::exit(1);
        }
    };
    indicator.self_test(SELF_TEST_FLASHES);

    let poll_interval = config.timing.poll_interval;
    match &config.mqtt {
        Some(mqtt) => {
            let (router, thread) = MqttRouter::connect(mqtt, &config.client_id, Arc::clone(&term));
            threads.push(thread);
            let mut controller = Controller::new(config.controller_config(), router, indicator);
            run(&mut controller, &sensor, poll_interval, &snapshot, &term);
            controller.router_mut().disconnect();
        }
        None => {
            info!("no messaging channel configured");
            let mut controller = Controller::new(config.controller_config(), NullRouter, indicator);
            run(&mut controller, &sensor, poll_interval, &snapshot, &term);
        }
    }

    if let Some(server) = server {
        server.shutdown();
    }
    for thread in threads {
        let _ = thread.join();
    }

    Ok(())
}

fn run<R: MessageRouter>(
    controller: &mut Controller<R, LedIndicator>,
    sensor: &DoorSensor,
    poll_interval: Duration,
    snapshot: &RwLock<Snapshot>,
    term: &AtomicBool,
) {
    info!("monitoring door access");
    while !term.load(Ordering::Relaxed) {
        let now = Instant::now();
        controller.tick(now, sensor.read());

        let current = controller.snapshot();
        *term_on_err!(snapshot.write(), term) = current;

        thread::sleep(poll_interval.saturating_sub(now.elapsed()));
    }
    controller.shutdown();
    info!("main loop exiting");
}

fn init_logging(level: LevelFilter) {
    if let Err(err) = syslog::init(syslog::Facility::LOG_DAEMON, level, Some("door-access")) {
        eprintln!("unable to connect to syslog: {}", err);
    }
}
