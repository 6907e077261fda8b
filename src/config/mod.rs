mod settings;

pub use settings::{Config, NotificationSettings, ServiceSettings, ServicesSettings, Settings};
