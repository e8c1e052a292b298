pub mod dialog;
pub mod input_panel;
pub mod library_list;
pub mod markup_view;
pub mod report_view;
pub mod solution_view;
