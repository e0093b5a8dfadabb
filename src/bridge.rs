//! # Bridge Module
//!
//! Main-loop state: the command mapper plus device availability, the
//! controller event decoder, status reporting and telemetry.
//!
//! The binary owns the `tokio::select!` loop and calls into [`Bridge`] for
//! each rescan tick, each controller event and on shutdown.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::controller::command_mapper::{CommandMapper, ConnectionState, Dispatch, DriveStatus};
use crate::controller::gamepad::{ControllerEvent, Gamepad};
use crate::controller::mapper::{EventMapper, InputAction};
use crate::protocol::Command;
use crate::serial::device::find_device;
use crate::telemetry::{self, SharedTelemetry, TelemetryEvent};

/// Ties controller input, the serial link and telemetry together.
pub struct Bridge {
    config: Config,
    mapper: CommandMapper,
    events: EventMapper,
    telemetry: Option<SharedTelemetry>,
    controller_tx: mpsc::Sender<ControllerEvent>,
    last_status: Option<DriveStatus>,
    last_recorded: Option<Command>,
}

impl Bridge {
    pub fn new(
        config: Config,
        mapper: CommandMapper,
        telemetry: Option<SharedTelemetry>,
        controller_tx: mpsc::Sender<ControllerEvent>,
    ) -> Self {
        let events = EventMapper::with_range(config.controller.axis_range());
        Self {
            config,
            mapper,
            events,
            telemetry,
            controller_tx,
            last_status: None,
            last_recorded: None,
        }
    }

    pub fn mapper(&self) -> &CommandMapper {
        &self.mapper
    }

    /// Tracks device availability for both the serial link and the controller.
    pub async fn rescan(&mut self) {
        if self.mapper.link_lost() {
            let device = self.mapper.link_device().map(|device| device.path.clone());
            warn!("Serial device detached");
            self.mapper.detach_link().await;
            self.record(TelemetryEvent::link(ConnectionState::Disconnected, device.as_deref()));
        }

        if !self.mapper.link_state().is_connected() {
            self.attach_serial().await;
        }

        if !self.mapper.controller_state().is_connected() {
            self.open_controller();
        }

        self.report_status();
    }

    async fn attach_serial(&mut self) {
        let serial = &self.config.serial;
        let device = match find_device(serial.explicit_port(), &serial.device_filter()) {
            Ok(device) => device,
            Err(e) => {
                debug!("{}", e);
                return;
            }
        };

        if self.mapper.attach_link(&device).await {
            self.last_recorded = None;
            self.record(TelemetryEvent::link(ConnectionState::Connected, Some(&device.path)));
        }
    }

    fn open_controller(&mut self) {
        let gamepad = match Gamepad::open(self.config.controller.explicit_device()) {
            Ok(gamepad) => gamepad,
            Err(e) => {
                debug!("{}", e);
                return;
            }
        };

        let path = gamepad.device_path().to_string();
        let name = gamepad.name().unwrap_or("unknown").to_string();

        match gamepad.spawn_reader(self.controller_tx.clone()) {
            Ok(_) => {
                info!("Controller connected: {} at {}", name, path);
                self.events.reset();
                self.mapper.controller_connected();
                self.record(TelemetryEvent::controller(ConnectionState::Connected));
            }
            Err(e) => warn!("Failed to start controller reader for {}: {}", path, e),
        }
    }

    /// Decodes one controller event and sends the resulting command.
    pub async fn on_controller_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Input(input) => {
                let dispatch = match self.events.process_event(&input) {
                    Some(InputAction::Axes(sample)) => self.mapper.handle_axes(sample).await,
                    Some(InputAction::Dpad { direction, pressed }) => {
                        self.mapper.handle_dpad(direction, pressed).await
                    }
                    None => return,
                };
                self.record_dispatch(dispatch);
            }
            ControllerEvent::Disconnected => {
                info!("Controller disconnected");
                self.events.reset();
                let dispatch = self.mapper.controller_disconnected().await;
                self.record(TelemetryEvent::controller(ConnectionState::Disconnected));
                self.record_dispatch(dispatch);
            }
        }

        self.report_status();
    }

    /// Sends Stop, closes the link and logs the final status.
    pub async fn shutdown(&mut self) {
        let device = self.mapper.link_device().map(|device| device.path.clone());
        let was_connected = self.mapper.link_state().is_connected();

        self.mapper.shutdown().await;

        if was_connected {
            self.record(TelemetryEvent::link(ConnectionState::Disconnected, device.as_deref()));
        }
        info!("{}", self.mapper.status());
    }

    /// Records transmitted commands, skipping repeats of the previous one.
    fn record_dispatch(&mut self, dispatch: Dispatch) {
        debug!("{} (sent: {})", dispatch.command, dispatch.sent);
        if !dispatch.sent || self.last_recorded == Some(dispatch.command) {
            return;
        }
        self.last_recorded = Some(dispatch.command);
        self.record(TelemetryEvent::command(&dispatch.command));
    }

    fn record(&self, event: TelemetryEvent) {
        if let Some(shared) = &self.telemetry {
            telemetry::record(shared, event);
        }
    }

    /// Logs the status line when it changed.
    fn report_status(&mut self) {
        let status = self.mapper.status();
        if self.last_status.as_ref() != Some(&status) {
            info!("{}", status);
            self.last_status = Some(status);
        }
    }
}
