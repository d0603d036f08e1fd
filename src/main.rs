#![no_std]
#![no_main]

// Required for ESP-IDF bootloader compatibility
// Use explicit parameters to ensure correct efuse block revision values
esp_bootloader_esp_idf::esp_app_desc!(
    env!("CARGO_PKG_VERSION"),  // version
    env!("CARGO_PKG_NAME"),     // project_name
    "00:00:00",                 // build_time
    "2025-01-01",               // build_date
    "0.0.0",                    // idf_ver (not using IDF)
    0x10000,                    // mmu_page_size (64KB)
    0,                          // min_efuse_blk_rev_full (accept all)
    u16::MAX                    // max_efuse_blk_rev_full (accept all)
);

use core::cell::RefCell;

use embassy_executor::Spawner;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::pipe::Pipe;
use embassy_usb::class::cdc_acm::{CdcAcmClass, ControlChanged, Receiver, Sender, State};
use embassy_usb::{Builder, UsbDevice};
use esp_backtrace as _;
use esp_hal::otg_fs::asynch::{Config as OtgConfig, Driver};
use esp_hal::otg_fs::Usb;
use esp_hal::timer::timg::TimerGroup;
use static_cell::StaticCell;

use cdc_event_notifier::config;
use cdc_event_notifier::events::SharedHandler;
use cdc_event_notifier::notifier::{InterfaceId, Notifier};
use cdc_event_notifier::sink::PipeSink;
use cdc_event_notifier::usb::{data_received_task, debug_writer_task, line_state_task};

/// Type alias for the OTG USB driver
type UsbDriver = Driver<'static>;

/// Pipe carrying trace text to the debug CDC port
type DebugPipe = Pipe<CriticalSectionRawMutex, { config::debug::PIPE_SIZE }>;

/// Notifier used by the firmware (traces to the debug CDC port)
type CdcNotifier = Notifier<PipeSink<'static, CriticalSectionRawMutex, { config::debug::PIPE_SIZE }>>;

/// Type alias for the handler shared by the CDC tasks
type CdcHandler = SharedHandler<'static, CriticalSectionRawMutex, CdcNotifier>;

/// Static executor for embassy
static EXECUTOR: StaticCell<esp_rtos::embassy::Executor> = StaticCell::new();

/// Trace text waiting to be sent on the debug port
static DEBUG_PIPE: DebugPipe = Pipe::new();

/// Notifier shared between the line state and receive tasks
static NOTIFIER: StaticCell<Mutex<CriticalSectionRawMutex, RefCell<CdcNotifier>>> = StaticCell::new();

/// Static buffers for the USB stack
static EP_OUT_BUFFER: StaticCell<[u8; config::usb::EP_OUT_BUFFER_SIZE]> = StaticCell::new();
static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static MSOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();
static CDC_STATE: StaticCell<State<'static>> = StaticCell::new();
static DEBUG_CDC_STATE: StaticCell<State<'static>> = StaticCell::new();

#[esp_hal::main]
fn main() -> ! {
    let peripherals = esp_hal::init(esp_hal::Config::default());

    // Initialise the RTOS scheduler with timer - MUST be done before any async operations
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Configure USB OTG (D- on GPIO19, D+ on GPIO20)
    let usb = Usb::new(peripherals.USB0, peripherals.GPIO20, peripherals.GPIO19);
    let ep_out_buffer = EP_OUT_BUFFER.init([0u8; config::usb::EP_OUT_BUFFER_SIZE]);
    let driver = Driver::new(usb, ep_out_buffer, OtgConfig::default());

    let mut usb_config = embassy_usb::Config::new(config::usb::VID, config::usb::PID);
    usb_config.manufacturer = Some(config::usb::MANUFACTURER);
    usb_config.product = Some(config::usb::PRODUCT);
    usb_config.max_power = 100;
    usb_config.max_packet_size_0 = 64;
    // Two CDC-ACM functions need interface association descriptors
    usb_config.device_class = 0xef;
    usb_config.device_sub_class = 0x02;
    usb_config.device_protocol = 0x01;
    usb_config.composite_with_iads = true;

    let mut builder = Builder::new(
        driver,
        usb_config,
        CONFIG_DESCRIPTOR.init([0; 256]),
        BOS_DESCRIPTOR.init([0; 256]),
        MSOS_DESCRIPTOR.init([0; 256]),
        CONTROL_BUF.init([0; 64]),
    );

    let cdc = CdcAcmClass::new(
        &mut builder,
        CDC_STATE.init(State::new()),
        config::usb::MAX_PACKET_SIZE,
    );
    let (sender, receiver, control) = cdc.split_with_control();

    // Second port carries the trace output (USB-Serial/JTAG is detached by OTG)
    let debug_cdc = CdcAcmClass::new(
        &mut builder,
        DEBUG_CDC_STATE.init(State::new()),
        config::usb::MAX_PACKET_SIZE,
    );
    let (debug_sender, _) = debug_cdc.split();
    let usb_device = builder.build();

    // Tracing or silent, depending on the simulated-hardware feature
    let sink = PipeSink::new(&DEBUG_PIPE);
    let notifier = NOTIFIER.init(Mutex::new(RefCell::new(Notifier::from_build(sink))));
    let handler = SharedHandler::new(notifier);

    // Create and run the embassy executor
    let executor = EXECUTOR.init(esp_rtos::embassy::Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(async_main(
            spawner,
            usb_device,
            sender,
            receiver,
            control,
            debug_sender,
            handler,
        ));
    })
}

#[embassy_executor::task]
async fn async_main(
    spawner: Spawner,
    usb_device: UsbDevice<'static, UsbDriver>,
    sender: Sender<'static, UsbDriver>,
    receiver: Receiver<'static, UsbDriver>,
    control: ControlChanged<'static>,
    debug_sender: Sender<'static, UsbDriver>,
    handler: CdcHandler,
) {
    spawner.spawn(usb_device_task(usb_device)).unwrap();
    spawner.spawn(cdc_debug_writer_task(debug_sender)).unwrap();
    spawner.spawn(cdc_line_state_task(control, sender, handler)).unwrap();
    spawner.spawn(cdc_data_received_task(receiver, handler)).unwrap();
}

/// Task that runs the USB device stack
#[embassy_executor::task]
async fn usb_device_task(mut usb_device: UsbDevice<'static, UsbDriver>) {
    usb_device.run().await;
}

/// Task that forwards DTR/RTS changes to the notifier
#[embassy_executor::task]
async fn cdc_line_state_task(
    control: ControlChanged<'static>,
    sender: Sender<'static, UsbDriver>,
    handler: CdcHandler,
) {
    line_state_task(control, sender, InterfaceId(config::usb::CDC_INTERFACE), handler).await;
}

/// Task that forwards received data notifications to the notifier
#[embassy_executor::task]
async fn cdc_data_received_task(receiver: Receiver<'static, UsbDriver>, handler: CdcHandler) {
    data_received_task(receiver, InterfaceId(config::usb::CDC_INTERFACE), handler).await;
}

/// Task that sends queued trace text to the debug CDC port
#[embassy_executor::task]
async fn cdc_debug_writer_task(debug_sender: Sender<'static, UsbDriver>) {
    debug_writer_task(&DEBUG_PIPE, debug_sender).await;
}
