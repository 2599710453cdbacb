use std::fmt::Write;
use std::panic;

use js_sys::JsString;
use log::*;
use web_sys::console;

pub use log::LevelFilter::*;

struct JsLog;
struct JsNotify;

impl log::Log for JsLog {
  fn enabled(&self, _: &log::Metadata<'_>) -> bool {
    true
  }

  fn log(&self, record: &log::Record<'_>) {
    console::log_1(&JsString::from(format!("{}", record.args())));
  }

  fn flush(&self) {}
}

impl log::Log for JsNotify {
  fn enabled(&self, _: &log::Metadata<'_>) -> bool {
    true
  }

  fn log(&self, record: &log::Record<'_>) {
    screeps::game::notify(&format!("{}", record.args()), None);
  }

  fn flush(&self) {}
}

/// Console output at `verbosity`, plus an in-game notification for
/// anything at warn or above.
pub fn setup_logging(verbosity: log::LevelFilter) {
  let applied = fern::Dispatch::new()
    .level(verbosity)
    .format(|out, message, record| {
      out.finish(format_args!("({}) {}: {}", record.level(), record.target(), message))
    })
    .chain(Box::new(JsLog) as Box<dyn log::Log>)
    .chain(
      fern::Dispatch::new()
        .level(log::LevelFilter::Warn)
        .format(|out, message, _record| {
          let time = screeps::game::time();
          out.finish(format_args!("[{time}] {message}"))
        })
        .chain(Box::new(JsNotify) as Box<dyn log::Log>),
    )
    .apply();
  if let Err(err) = applied {
    console::log_1(&JsString::from(format!("logger already set: {err}")));
    return;
  }

  panic::set_hook(Box::new(|info| {
    let mut fmt_error = String::new();
    let _ = writeln!(fmt_error, "{info}");
    error!("{fmt_error}");
  }));
}
