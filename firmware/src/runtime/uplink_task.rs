use embassy_futures::select::{Either, select};
use embassy_time::Timer;

use node_core::telemetry::TelemetryRecorder;

use super::NodeScheduler;
use crate::link::{EventReceiver, NodeInstant};

/// Drives the uplink scheduler: waits on modem events and the next scheduled
/// attempt, whichever comes first. When no deadline is armed the task parks
/// on the event channel alone.
#[embassy_executor::task]
pub async fn run(
    mut scheduler: NodeScheduler,
    events: EventReceiver<'static>,
    mut telemetry: TelemetryRecorder<NodeInstant>,
) -> ! {
    scheduler.start(NodeInstant::now(), &mut telemetry);
    defmt::info!("uplink: join requested");

    loop {
        match scheduler.next_fire() {
            Some(deadline) => {
                match select(events.receive(), Timer::at(deadline.into_inner())).await {
                    Either::First(event) => {
                        scheduler.handle_event(event, NodeInstant::now(), &mut telemetry);
                        defmt::info!("uplink: phase {=str}", scheduler.phase().label());
                    }
                    Either::Second(()) => {
                        scheduler.poll(NodeInstant::now(), &mut telemetry);
                    }
                }
            }
            None => {
                let event = events.receive().await;
                scheduler.handle_event(event, NodeInstant::now(), &mut telemetry);
                defmt::info!("uplink: phase {=str}", scheduler.phase().label());
            }
        }
    }
}
