/// Square input resolution of the exported detector (width, height).
pub const DEFAULT_INPUT_SIZE: (u32, u32) = (640, 640);

/// Padding value used for the letterbox border.
pub const LETTERBOX_COLOR: u8 = 114;
