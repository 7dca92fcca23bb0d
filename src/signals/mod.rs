// Signal clients — trait-based adapters to the external analysis services.
//
// ImageAnalyzer and TextAnalyzer define the interface. The HTTP adapters
// talk to the image and text services; anything else (an in-process model,
// a test fake) can stand in without touching the pipeline.

pub mod http;
pub mod image;
pub mod lexicon;
pub mod text;
pub mod traits;
