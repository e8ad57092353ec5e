mod fitness;
mod placement;
mod selection;
