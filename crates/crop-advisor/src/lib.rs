//! crop-advisor: the user-facing side of crop recommendation.
//!
//! Wraps [`crop_learning`] with what a request handler needs: form validation
//! against the category choices, user-visible [`Messages`], and the retrain,
//! dataset upload and status actions of an admin page. The `crop-advisor`
//! binary drives an [`Advisor`] from the command line.
//!
//! ```rust,ignore
//! use crop_advisor::{Advisor, CropRecommendationForm};
//! use crop_learning::LearningConfig;
//!
//! let advisor = Advisor::new(LearningConfig::rooted_at("ml"));
//! let page = advisor.crop_suggestion(&CropRecommendationForm::new("clay", "winter", "low"));
//! match page.prediction {
//!     Some(crop) => println!("Recommended crop: {crop}"),
//!     None => page.messages.iter().for_each(|m| println!("{m}")),
//! }
//! ```

pub mod error;
pub mod forms;
pub mod messages;
pub mod service;
pub mod settings;

pub use error::AdvisorError;
pub use forms::{Choice, ChoiceField, CropRecommendationForm, FormErrors};
pub use messages::{Level, Message, Messages};
pub use service::{
    ActionOutcome, Advisor, BatchSuggestion, CropCount, CropInsights, ModelStatus, SuggestionPage,
};
pub use settings::ConfigOverrides;
