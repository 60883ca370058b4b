pub mod admin;
pub mod course;
pub mod enrollment;
pub mod order;
pub mod promo_code;
pub mod topic;
pub mod user;

pub use admin::Admin;
pub use course::{Course, CourseFilter, NewCourseRequest, UpdateCourseRequest};
pub use enrollment::{Enrollment, EnrollmentStatus};
pub use order::{
    CheckoutResponse, CreateOrderRequest, Order, OrderFilter, OrderKind, OrderStatus,
    VerifyPaymentRequest,
};
pub use promo_code::{NewPromoCodeRequest, PromoCode, UpdatePromoCodeRequest, ValidatePromoRequest};
pub use topic::{NewTopicRequest, ReorderTopicsRequest, Topic, UpdateTopicRequest};
pub use user::{LoginRequest, RegisterRequest, UpdateProfileRequest, User};
