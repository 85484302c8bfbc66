//! Handshake scenarios on the simulated bus.
//!
//! Sync pins 10..=19 are reserved for these tests; the edge table is
//! process-wide.

use proptest::prelude::*;
use pulsesync::config::SyncConfig;
use pulsesync::context::DeviceContext;
use pulsesync::hal::Level;
use pulsesync::handshake::{
    handshake_machine, HandshakeMachine, Phase, Role, SyncFailure, SyncOutcome, SyncStep,
};
use pulsesync::protocol::{Device, MasterState};
use pulsesync::sim::{SimBus, SimDevice, Waveform};
use std::thread;

const TICK: u32 = 20;
const MAX_POLLS: usize = 50_000;

fn nested(input: Waveform) -> (HandshakeMachine<SimDevice>, DeviceContext<SimDevice>) {
    let config = SyncConfig::default();
    let mut hw = SimBus::scripted(input);
    let machine = handshake_machine(&mut hw, &config).unwrap();
    let ctx = DeviceContext::new(hw, config).unwrap();
    (machine, ctx)
}

/// Tick the nested machine once per `TICK` until it parks with an outcome.
fn run_nested(machine: &mut HandshakeMachine<SimDevice>, ctx: &mut DeviceContext<SimDevice>) {
    for _ in 0..MAX_POLLS {
        machine.tick(ctx);
        if ctx.outcome.is_some() && machine.current() == SyncStep::Idle {
            machine.tick(ctx);
            return;
        }
        ctx.hw.advance(TICK);
    }
    panic!("nested machine never parked: {:?}", machine.current());
}

fn initiator_waiting_for(
    confirmation_us: u32,
) -> (HandshakeMachine<SimDevice>, DeviceContext<SimDevice>) {
    let (machine, mut ctx) = nested(Waveform::new().idle(1_000).pulse(confirmation_us));
    ctx.begin_attempt(Role::Initiate);
    machine.request(SyncStep::InitiateWaitForConfirmation);
    (machine, ctx)
}

#[test]
fn confirmation_inside_window_moves_to_final_trigger() {
    let (mut machine, mut ctx) = initiator_waiting_for(22_000);

    machine.tick(&mut ctx);
    assert_eq!(machine.current(), SyncStep::InitiateSendFinalTrigger);
    assert_eq!(ctx.hw.now(), 23_000);

    // Repeated ticks inside the step raise the trigger only once.
    for _ in 0..5 {
        machine.tick(&mut ctx);
    }
    assert_eq!(ctx.hw.tx_edges(), vec![(23_000, Level::High)]);
    assert_eq!(ctx.hw.armed_timers(), 1);

    run_nested(&mut machine, &mut ctx);
    assert_eq!(
        ctx.hw.tx_edges(),
        vec![(23_000, Level::High), (24_000, Level::Low)]
    );
    // Armed 1_020us after the rising edge, the action still lands exactly
    // five half periods after it.
    assert_eq!(ctx.hw.action_pulses(), vec![(25_500, 100)]);
    assert_eq!(
        ctx.outcome,
        Some(SyncOutcome::Synced {
            pulse_width_us: 500
        })
    );
    assert_eq!(ctx.hw.armed_timers(), 0);
}

#[test]
fn confirmation_outside_window_times_out() {
    let (mut machine, mut ctx) = initiator_waiting_for(26_000);

    machine.tick(&mut ctx);
    assert_eq!(machine.current(), SyncStep::Timeout);

    machine.tick(&mut ctx);
    assert_eq!(machine.current(), SyncStep::Idle);
    assert_eq!(
        ctx.outcome,
        Some(SyncOutcome::Failed {
            failure: Some(SyncFailure::TimingViolation {
                phase: Phase::Confirmation,
                measured_us: 26_000,
                min_us: 20_000,
                max_us: 25_000,
            })
        })
    );
    assert!(ctx.hw.tx_edges().is_empty());
}

#[test]
fn missing_confirmation_times_out() {
    let (mut machine, mut ctx) = nested(Waveform::new());
    ctx.begin_attempt(Role::Initiate);
    machine.request(SyncStep::InitiateWaitForConfirmation);

    run_nested(&mut machine, &mut ctx);
    assert_eq!(
        ctx.outcome,
        Some(SyncOutcome::Failed {
            failure: Some(SyncFailure::MissingPulse {
                phase: Phase::Confirmation,
                timeout_us: 100_000,
            })
        })
    );
    assert_eq!(
        machine.history().get_path(),
        vec![
            SyncStep::Idle,
            SyncStep::InitiateWaitForConfirmation,
            SyncStep::Timeout,
            SyncStep::Idle,
        ]
    );
}

#[test]
fn receiver_synchronizes_to_a_scripted_initiator() {
    let trigger_at = 78_600;
    let wave = Waveform::new()
        .idle(100)
        .pulse(17_500)
        .idle(1_000)
        .pulses(20, 500, 500)
        .idle(40_000)
        .pulse(1_000);
    assert_eq!(wave.edges()[wave.edges().len() - 2], (trigger_at, Level::High));

    let (mut machine, mut ctx) = nested(wave);
    ctx.begin_attempt(Role::Request);
    machine.request(Role::Request.entry_step());
    run_nested(&mut machine, &mut ctx);

    assert_eq!(
        ctx.outcome,
        Some(SyncOutcome::Synced {
            pulse_width_us: 500
        })
    );
    assert_eq!(ctx.attempt.as_ref().unwrap().pulse_width_us, Some(500));

    let confirmation = ctx.hw.tx_edges();
    assert_eq!(confirmation.len(), 2);
    assert_eq!(confirmation[1].0 - confirmation[0].0, 22_500);

    let pulses = ctx.hw.action_pulses();
    assert_eq!(pulses.len(), 1);
    let (rise, width) = pulses[0];
    assert_eq!(width, 100);
    let delay = rise - trigger_at;
    assert!(
        (2_500..=2_500 + u64::from(TICK)).contains(&delay),
        "action fired {delay}us after the trigger"
    );
    assert_eq!(ctx.hw.armed_timers(), 0);
    assert_eq!(
        machine.history().get_path(),
        vec![
            SyncStep::Idle,
            SyncStep::RequestWaitForInitialPulse,
            SyncStep::RequestMeasurePreamble,
            SyncStep::RequestSendConfirmation,
            SyncStep::RequestWaitForFinalTrigger,
            SyncStep::Synced,
            SyncStep::Idle,
        ]
    );
}

#[test]
fn short_preamble_times_out() {
    let wave = Waveform::new()
        .idle(100)
        .pulse(17_500)
        .idle(1_000)
        .pulses(8, 500, 500)
        .high(500);

    let (mut machine, mut ctx) = nested(wave);
    ctx.begin_attempt(Role::Request);
    machine.request(Role::Request.entry_step());
    run_nested(&mut machine, &mut ctx);

    assert_eq!(
        ctx.outcome,
        Some(SyncOutcome::Failed {
            failure: Some(SyncFailure::InsufficientPreamble {
                measured: 8,
                expected: 20,
            })
        })
    );
    assert!(ctx.hw.tx_edges().is_empty());
}

#[test]
fn wrong_wake_up_width_means_no_initiator() {
    let (mut machine, mut ctx) = nested(Waveform::new().idle(100).pulse(5_000));
    ctx.begin_attempt(Role::Request);
    machine.request(Role::Request.entry_step());
    run_nested(&mut machine, &mut ctx);

    assert_eq!(ctx.outcome, Some(SyncOutcome::NoInitiator));
    assert!(!machine
        .history()
        .get_path()
        .contains(&SyncStep::Timeout));
}

#[test]
fn receiver_without_trigger_times_out() {
    let wave = Waveform::new()
        .idle(100)
        .pulse(17_500)
        .idle(1_000)
        .pulses(20, 500, 500);

    let (mut machine, mut ctx) = nested(wave);
    ctx.begin_attempt(Role::Request);
    machine.request(Role::Request.entry_step());
    run_nested(&mut machine, &mut ctx);

    assert_eq!(
        ctx.outcome,
        Some(SyncOutcome::Failed {
            failure: Some(SyncFailure::TriggerTimeout { timeout_us: 50_000 })
        })
    );
    assert_eq!(ctx.hw.armed_timers(), 0);
}

struct Summary {
    outcome: Option<SyncOutcome>,
    action: Vec<(u64, u32)>,
    tx: Vec<(u64, Level)>,
    attached: u32,
    detached: u32,
    armed_timers: usize,
    path: Vec<MasterState>,
    edge_armed: bool,
}

/// Drive one device through a handshake, dropping it before returning so
/// its peer sees a settled line.
fn drive(hw: SimDevice, pin: u8, role: Role, start_after: u32) -> Summary {
    let config = SyncConfig {
        sync_pin: pin,
        ..SyncConfig::default()
    };
    let mut device = Device::new(hw, config).unwrap();
    device.hardware_mut().advance(start_after);
    device.begin(role);

    for _ in 0..MAX_POLLS {
        device.poll();
        if device.outcome().is_some() && device.active_state() == Some(MasterState::Idle) {
            let hw = device.hardware();
            return Summary {
                outcome: device.outcome(),
                action: hw.action_pulses(),
                tx: hw.tx_edges(),
                attached: hw.attach_count(pin),
                detached: hw.detach_count(pin),
                armed_timers: hw.armed_timers(),
                path: device.history().get_path(),
                edge_armed: device.context().edge.is_armed(),
            };
        }
        device.hardware_mut().advance(TICK);
    }
    panic!("{role:?} never settled in {:?}", device.state());
}

fn run_pair(receiver_start: u32, initiator_start: u32) -> (Summary, Summary) {
    let (receiver_hw, initiator_hw) = SimBus::pair();
    thread::scope(|scope| {
        let receiver = scope.spawn(move || drive(receiver_hw, 10, Role::Request, receiver_start));
        let initiator =
            scope.spawn(move || drive(initiator_hw, 11, Role::Initiate, initiator_start));
        (receiver.join().unwrap(), initiator.join().unwrap())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn two_devices_synchronize(
        receiver_start in 0..=200u32,
        initiator_start in 200..5_000u32
    ) {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let (receiver, initiator) = run_pair(receiver_start, initiator_start);

        for side in [&receiver, &initiator] {
            prop_assert_eq!(
                side.outcome,
                Some(SyncOutcome::Synced {
                    pulse_width_us: 500
                })
            );
            prop_assert_eq!(side.attached, 2);
            prop_assert_eq!(side.detached, 1);
            prop_assert!(side.edge_armed);
            prop_assert_eq!(side.armed_timers, 0);
            prop_assert_eq!(
                &side.path,
                &vec![MasterState::Idle, MasterState::Sync, MasterState::Idle]
            );
            prop_assert_eq!(side.action.len(), 1);
            prop_assert_eq!(side.action[0].1, 100);
        }

        // Initiator line: wake-up, 20 preamble pulses, final trigger.
        prop_assert_eq!(initiator.tx.len(), 2 * 22);
        prop_assert_eq!(initiator.tx[1].0 - initiator.tx[0].0, 17_500);
        let trigger_at = initiator.tx[initiator.tx.len() - 2].0;

        // Receiver line: the confirmation pulse only.
        prop_assert_eq!(receiver.tx.len(), 2);

        // The Initiator knows the exact rising edge; the Receiver sees it
        // on its next poll.
        let (receiver_action, initiator_action) = (receiver.action[0].0, initiator.action[0].0);
        prop_assert_eq!(initiator_action - trigger_at, 2_500);
        let delay = receiver_action - trigger_at;
        prop_assert!(
            (2_500..=2_500 + u64::from(TICK)).contains(&delay),
            "receiver fired {}us after the trigger",
            delay
        );
    }
}

#[test]
fn lone_receiver_reports_no_initiator() {
    let (receiver_hw, quiet_hw) = SimBus::pair();
    drop(quiet_hw);

    let summary = drive(receiver_hw, 12, Role::Request, 0);
    assert_eq!(summary.outcome, Some(SyncOutcome::NoInitiator));
    assert_eq!(summary.detached, 1);
    assert_eq!(summary.attached, 2);
    assert!(summary.action.is_empty());
}

#[test]
fn lone_initiator_times_out_waiting_for_confirmation() {
    let (initiator_hw, quiet_hw) = SimBus::pair();
    drop(quiet_hw);

    let summary = drive(initiator_hw, 13, Role::Initiate, 0);
    assert_eq!(
        summary.outcome,
        Some(SyncOutcome::Failed {
            failure: Some(SyncFailure::MissingPulse {
                phase: Phase::Confirmation,
                timeout_us: 100_000,
            })
        })
    );
    assert_eq!(summary.tx.len(), 2 * 21);
    assert!(summary.action.is_empty());
}
