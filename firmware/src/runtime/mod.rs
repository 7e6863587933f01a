use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::Adc;
use embassy_sync::channel::Channel;

use node_core::link::NoopDownlinkSink;
use node_core::scheduler::{UplinkConfig, UplinkScheduler};
use node_core::telemetry::TelemetryRecorder;

use crate::link::{self, ModemTransport, NodeInstant};
use crate::sensors::AdcSensors;

mod modem_task;
mod uplink_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) static EVENT_QUEUE: link::EventQueue = Channel::new();
pub(super) static COMMAND_QUEUE: link::CommandQueue = Channel::new();

pub(crate) type NodeScheduler =
    UplinkScheduler<NodeInstant, ModemTransport<'static>, AdcSensors<'static>, NoopDownlinkSink>;

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA1,
        PA2,
        PA3,
        ADC1,
        USART2,
        ..
    } = hal::init(config);

    let sensors = AdcSensors::new(Adc::new(ADC1), PA0, PA1);
    let transport = ModemTransport::new(COMMAND_QUEUE.sender());
    let scheduler = UplinkScheduler::new(
        UplinkConfig::default(),
        transport,
        sensors,
        NoopDownlinkSink::new(),
    );

    spawner
        .spawn(uplink_task::run(
            scheduler,
            EVENT_QUEUE.receiver(),
            TelemetryRecorder::new(),
        ))
        .expect("failed to spawn uplink scheduler task");

    spawner
        .spawn(modem_task::run(
            USART2,
            PA2,
            PA3,
            COMMAND_QUEUE.receiver(),
            EVENT_QUEUE.sender(),
        ))
        .expect("failed to spawn modem task");

    core::future::pending::<()>().await;
}
