use crate::assemble::Assembly;
use crate::dimensions::Dimensions;

/// Render callback handed the assembled window.
///
/// Implementations draw the rows, columns and cells however they like and
/// may report the measured size of what they drew. The height is the total
/// for all rendered rows; the table averages it per row.
pub trait Layout: Send {
    fn render(&mut self, assembly: &Assembly) -> Option<Dimensions>;

    /// The virtual canvas for the whole table changed size
    fn resize_canvas(&mut self, _canvas: Dimensions) {}
}

/// Adapter turning a closure into a [`Layout`]
pub struct FnLayout<F>(pub F);

impl<F> Layout for FnLayout<F>
where
    F: FnMut(&Assembly) -> Option<Dimensions> + Send,
{
    fn render(&mut self, assembly: &Assembly) -> Option<Dimensions> {
        (self.0)(assembly)
    }
}

/// Wrap a closure as a [`Layout`]
pub fn layout_fn<F>(f: F) -> FnLayout<F>
where
    F: FnMut(&Assembly) -> Option<Dimensions> + Send,
{
    FnLayout(f)
}
