/*!
    Rectangles and dimensions.
*/

/**
    A rectangle in pixels, stored as edges.

    `right` and `bottom` are exclusive. An all-zero rectangle means "not set",
    which is how an absent crop is represented.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Rect {
    #[inline]
    pub const fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /**
        Rectangle covering `width` x `height` starting at the origin.
    */
    #[inline]
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /**
        Width of the rectangle, zero if the edges are inverted.
    */
    #[inline]
    pub const fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    /**
        Height of the rectangle, zero if the edges are inverted.
    */
    #[inline]
    pub const fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /**
        Returns true if all edges are zero.
    */
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.left == 0 && self.top == 0 && self.right == 0 && self.bottom == 0
    }
}

/**
    Width and height in pixels.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dim {
    pub width: u32,
    pub height: u32,
}

impl Dim {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /**
        Component-wise maximum of two dimensions.
    */
    #[inline]
    pub const fn max(self, other: Self) -> Self {
        Self {
            width: if self.width > other.width {
                self.width
            } else {
                other.width
            },
            height: if self.height > other.height {
                self.height
            } else {
                other.height
            },
        }
    }
}
