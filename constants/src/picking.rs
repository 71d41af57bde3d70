/// Picking colour written where no point was drawn (white background).
pub const NO_POINT_ID: u32 = 0xFF_FFFF;

/// Width and height, in CSS pixels, of the box sampled around the cursor for hover.
pub const HOVER_BOX_SIZE: f32 = 4.0;

/// Maximum number of points one rectangle selection may return.
pub const MAX_BOX_SELECTION: usize = 100;

pub const BOX_SELECTION_LIMIT_WARNING: &str =
    "You can select up to 100 points at a time, and the first 100 points are selected by default";

pub const UNDO_LIMIT_WARNING: &str = "You can only go back one step";

/// Selection cause reported for rectangle selections.
pub const BOUNDING_BOX_CAUSE: &str = "boundingbox";
