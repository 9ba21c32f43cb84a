mod dispatch;

pub use dispatch::execute;
