pub mod landmark_detection_client;
pub mod text_generation_client;
