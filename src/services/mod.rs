pub mod callback_receiver;
pub mod payment_status;
