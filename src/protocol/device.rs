use super::{DeviceError, IdleState, MasterState, SyncCoordinator};
use crate::builder::StateMachineBuilder;
use crate::config::SyncConfig;
use crate::context::DeviceContext;
use crate::core::StateHistory;
use crate::engine::{StateMachine, Transitions};
use crate::hal::Hardware;
use crate::handshake::{handshake_machine, Role, SyncOutcome};

/// One synchronizing device: its hardware, the top-level machine and the
/// nested handshake machine hosted by the `Sync` state.
///
/// The application calls [`poll`](Self::poll) from its main loop and
/// [`begin`](Self::begin) to start a handshake.
pub struct Device<H: Hardware> {
    machine: StateMachine<MasterState, Role, DeviceContext<H>>,
    ctx: DeviceContext<H>,
}

impl<H: Hardware> Device<H> {
    /// Validate `config`, wire both machines and arm the edge detector.
    pub fn new(mut hw: H, config: SyncConfig) -> Result<Self, DeviceError> {
        config.validate()?;
        let nested = handshake_machine(&mut hw, &config)?;
        let machine = StateMachineBuilder::<MasterState, Role, DeviceContext<H>>::new()
            .initial(MasterState::Idle)
            .state(Box::new(IdleState))
            .state(Box::new(SyncCoordinator::new(nested)))
            .build()?;

        let mut ctx = DeviceContext::new(hw, config)?;
        ctx.edge.arm(&mut ctx.hw);
        Ok(Self { machine, ctx })
    }

    /// Queue a handshake in `role`; Idle picks it up on the next poll.
    pub fn begin(&mut self, role: Role) {
        self.ctx.pending_role = Some(role);
    }

    /// One main-loop iteration.
    pub fn poll(&mut self) {
        self.machine.tick(&mut self.ctx);
    }

    /// Request a top-level transition directly.
    pub fn request(&self, target: MasterState) {
        self.machine.request(target);
    }

    /// Transition handle for use from interrupt handlers.
    pub fn transitions(&self) -> &Transitions<MasterState, Role> {
        self.machine.transitions()
    }

    /// The most recently requested top-level state.
    pub fn state(&self) -> MasterState {
        self.machine.current()
    }

    /// The top-level state being dispatched to, if it is registered.
    pub fn active_state(&self) -> Option<MasterState> {
        self.machine.active()
    }

    /// How the last handshake ended, once it has.
    pub fn outcome(&self) -> Option<SyncOutcome> {
        self.ctx.outcome
    }

    /// Rising edges seen on the sync pin while idle.
    pub fn edges_observed(&self) -> u32 {
        self.ctx.edges_observed
    }

    pub fn history(&self) -> &StateHistory<MasterState> {
        self.machine.history()
    }

    pub fn context(&self) -> &DeviceContext<H> {
        &self.ctx
    }

    pub fn hardware(&self) -> &H {
        &self.ctx.hw
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.ctx.hw
    }
}

#[cfg(test)]
mod tests {
    // Pins 20..=29, and the default pin 4, are reserved for these tests;
    // the edge table is process-wide.
    use super::*;
    use crate::config::ConfigError;
    use crate::sim::{SimBus, SimDevice, Waveform};

    fn device(pin: u8, input: Waveform) -> Device<SimDevice> {
        let config = SyncConfig {
            sync_pin: pin,
            ..SyncConfig::default()
        };
        Device::new(SimBus::scripted(input), config).unwrap()
    }

    #[test]
    fn construction_arms_the_edge_detector() {
        let device = device(20, Waveform::new());

        assert_eq!(device.state(), MasterState::Idle);
        assert!(device.context().edge.is_armed());
        assert_eq!(device.hardware().attach_count(20), 1);
    }

    #[test]
    fn nominal_configuration_builds_a_device() {
        let config = SyncConfig::default();
        assert_eq!(config.sync_pin, 4);

        let device = Device::new(SimBus::scripted(Waveform::new()), config).unwrap();
        assert_eq!(device.state(), MasterState::Idle);
        assert_eq!(device.hardware().attach_count(4), 1);
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let config = SyncConfig {
            sync_pin: 21,
            preamble_pulses: 0,
            ..SyncConfig::default()
        };

        let result = Device::new(SimBus::scripted(Waveform::new()), config);
        assert!(matches!(
            result,
            Err(DeviceError::Config(ConfigError::Invalid { .. }))
        ));
    }

    #[test]
    fn silent_line_ends_in_no_initiator() {
        let mut device = device(22, Waveform::new());
        device.begin(Role::Request);

        device.poll();
        assert_eq!(device.state(), MasterState::Sync);

        device.poll();
        assert!(!device.context().edge.is_armed());
        assert_eq!(device.hardware().detach_count(22), 1);

        device.poll();
        assert_eq!(device.outcome(), Some(SyncOutcome::NoInitiator));
        assert_eq!(device.state(), MasterState::Idle);
        assert_eq!(device.hardware().now(), 100_000);

        device.poll();
        assert_eq!(device.active_state(), Some(MasterState::Idle));
        assert!(device.context().edge.is_armed());
        assert_eq!(device.hardware().attach_count(22), 2);
        assert_eq!(
            device.history().get_path(),
            vec![MasterState::Idle, MasterState::Sync, MasterState::Idle]
        );
    }

    #[test]
    fn idle_counts_sync_edges() {
        let mut device = device(23, Waveform::new().idle(100).pulse(50).idle(100).pulse(50));

        device.hardware_mut().advance(160);
        device.poll();
        assert_eq!(device.edges_observed(), 1);

        device.poll();
        assert_eq!(device.edges_observed(), 1);

        device.hardware_mut().advance(200);
        device.poll();
        assert_eq!(device.edges_observed(), 2);
    }

    #[test]
    fn sync_without_a_role_returns_to_idle() {
        let mut device = device(24, Waveform::new());

        device.request(MasterState::Sync);
        device.poll();
        assert_eq!(device.state(), MasterState::Idle);
        device.poll();

        assert_eq!(device.active_state(), Some(MasterState::Idle));
        assert_eq!(device.outcome(), None);
        assert_eq!(device.hardware().detach_count(24), 0);
    }

    #[test]
    fn unregistered_states_suspend_dispatch() {
        let mut device = device(25, Waveform::new());

        device.transitions().request(MasterState::Tx);
        device.poll();
        assert_eq!(device.state(), MasterState::Tx);
        assert_eq!(device.active_state(), None);

        device.request(MasterState::Idle);
        device.poll();
        assert_eq!(device.active_state(), Some(MasterState::Idle));
    }
}
