use custom_error::custom_error;

custom_error! {pub GIFEncoderError
    NotStarted {operation: String} = "Cannot {operation}: encoder is not started yet",
    AlreadyStarted {operation: String} = "Cannot {operation}: encoder is already started, options are frozen",
    AlreadyFinished {operation: String} = "Cannot {operation}: encoder is already finished",
    MissingPixelData {expected: usize, actual: usize} = "Expected {expected} bytes of rgba pixel data, got {actual}",
    InvalidOption {description: String} = "Invalid option: {description}",
}
