pub mod dispatch;
pub mod image_widget;
pub mod window;
