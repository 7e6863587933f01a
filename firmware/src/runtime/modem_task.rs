use embassy_futures::join::join;
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use embassy_time::{Duration, Timer};
use embedded_io_async::{Read, Write};
use static_cell::StaticCell;

use crate::link::{CommandReceiver, EventSender};
use crate::modem::{self, ModemLine};

const MODEM_UART_BAUD: u32 = 57_600;
const UART_BUFFER_SIZE: usize = 256;
const MAX_LINE_LEN: usize = 192;

static UART_TX_BUFFER: StaticCell<[u8; UART_BUFFER_SIZE]> = StaticCell::new();
static UART_RX_BUFFER: StaticCell<[u8; UART_BUFFER_SIZE]> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART2_LPUART2 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART2>;
});

#[embassy_executor::task]
pub async fn run(
    usart: Peri<'static, hal::peripherals::USART2>,
    tx_pin: Peri<'static, hal::peripherals::PA2>,
    rx_pin: Peri<'static, hal::peripherals::PA3>,
    commands: CommandReceiver<'static>,
    events: EventSender<'static>,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = MODEM_UART_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;

    let uart = BufferedUart::new(
        usart,
        rx_pin,
        tx_pin,
        UART_TX_BUFFER.init([0; UART_BUFFER_SIZE]),
        UART_RX_BUFFER.init([0; UART_BUFFER_SIZE]),
        UartIrqs,
        config,
    )
    .expect("failed to initialize modem UART");

    let (mut uart_tx, mut uart_rx) = uart.split();

    let command_writer = async move {
        loop {
            let command = commands.receive().await;
            let line = match command.render() {
                Ok(line) => line,
                Err(_) => {
                    defmt::warn!("modem: command render overflow");
                    continue;
                }
            };

            let data = line.as_bytes();
            let mut written = 0usize;

            while written < data.len() {
                match uart_tx.write(&data[written..]).await {
                    Ok(count) if count > 0 => {
                        written += count;
                    }
                    Ok(_) => {}
                    Err(_) => {
                        defmt::warn!("modem: UART write error");
                        Timer::after(Duration::from_millis(5)).await;
                        break;
                    }
                }
            }

            if written == data.len() && uart_tx.flush().await.is_err() {
                defmt::warn!("modem: UART flush error");
                Timer::after(Duration::from_millis(5)).await;
            }
        }
    };

    let event_reader = async move {
        let mut pending = heapless::Vec::<u8, MAX_LINE_LEN>::new();
        let mut ingress = [0u8; 64];
        loop {
            match uart_rx.read(&mut ingress).await {
                Ok(count) if count > 0 => {
                    for &byte in &ingress[..count] {
                        if byte == b'\n' {
                            dispatch_line(pending.as_slice(), &events).await;
                            pending.clear();
                        } else if pending.push(byte).is_err() {
                            defmt::warn!("modem: dropping oversized line");
                            pending.clear();
                        }
                    }
                }
                Ok(_) => {}
                Err(_) => {
                    defmt::warn!("modem: UART read error");
                    Timer::after(Duration::from_millis(5)).await;
                }
            }
        }
    };

    join(command_writer, event_reader).await;
    loop {
        core::future::pending::<()>().await;
    }
}

async fn dispatch_line(raw: &[u8], events: &EventSender<'static>) {
    let Ok(text) = core::str::from_utf8(raw) else {
        defmt::warn!("modem: non-UTF-8 line");
        return;
    };

    match modem::parse_line(text) {
        Ok(ModemLine::Event(event)) => events.send(event).await,
        // Command responses carry no scheduling information.
        Ok(_) => {}
        Err(_) => {
            if !text.trim_ascii().is_empty() {
                defmt::warn!("modem: unrecognized line");
            }
        }
    }
}
