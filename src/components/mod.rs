pub mod clock;
pub mod settings_form;
pub mod status_bar;
pub mod timetable_view;
pub mod weather_card;

pub use clock::Clock;
pub use settings_form::{SettingsForm, SettingsFormState};
pub use status_bar::StatusBar;
pub use timetable_view::TimetableView;
pub use weather_card::WeatherCard;
