use std::{
    backtrace::Backtrace,
    panic::{PanicHookInfo, take_hook},
    thread,
};

/// Route panics through `tracing` (and so into the log files) before the
/// previous hook prints them.
pub fn install() {
    let previous_hook = take_hook();

    std::panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
        let location = info
            .location()
            .map(|loc| loc.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        let current = thread::current();

        tracing::error!(
            target: "rssi_scan_cli::panic",
            thread = current.name().unwrap_or("<unnamed>"),
            %location,
            payload = %payload(info),
            backtrace = %Backtrace::capture(),
            "Panic"
        );

        previous_hook(info);
    }));
}

fn payload(info: &PanicHookInfo<'_>) -> String {
    if let Some(s) = info.payload().downcast_ref::<&'static str>() {
        return (*s).to_string();
    }
    if let Some(s) = info.payload().downcast_ref::<String>() {
        return s.clone();
    }
    info.to_string()
}
